use base64::{engine::general_purpose, Engine};
use mime_guess::mime::Mime;
use serde::{Deserialize, Serialize};

/// A file picked by the user, before validation or encoding.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(file_name: impl Into<String>, content_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type,
            bytes,
        }
    }

    /// Declared content type without parameters, or a guess from the file
    /// extension when nothing parseable was declared.
    pub fn mime_type(&self) -> String {
        let declared = self
            .content_type
            .as_deref()
            .and_then(|raw| raw.trim().parse::<Mime>().ok());

        match declared {
            Some(mime) => mime.essence_str().to_ascii_lowercase(),
            None => mime_guess::from_path(&self.file_name)
                .first_raw()
                .unwrap_or("application/octet-stream")
                .to_string(),
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime_type().starts_with("image/")
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Image payload as a `data:<mime>;base64,<payload>` URL.
///
/// Only built through [`EncodedImage::encode`], so the string is always
/// well-formed. Never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    data_url: String,
    mime_len: usize,
    byte_len: usize,
}

impl EncodedImage {
    const SCHEME: &'static str = "data:";

    pub fn encode(file: &ImageFile) -> Self {
        let mime_type = file.mime_type();
        let payload = general_purpose::STANDARD.encode(&file.bytes);
        let data_url = format!("{}{};base64,{}", Self::SCHEME, mime_type, payload);

        log::debug!(
            "🔄 Encoded {} ({} bytes -> {} chars)",
            file.file_name,
            file.bytes.len(),
            data_url.len()
        );

        Self {
            data_url,
            mime_len: mime_type.len(),
            byte_len: file.bytes.len(),
        }
    }

    pub fn mime_type(&self) -> &str {
        let start = Self::SCHEME.len();
        &self.data_url[start..start + self.mime_len]
    }

    pub fn as_data_url(&self) -> &str {
        &self.data_url
    }

    /// Size of the image before Base64 encoding.
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WorkflowPhase {
    Idle,
    ImageSelected,
    Analyzing,
    Analyzed,
    Answering,
    Answered,
}

impl std::fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkflowPhase::Idle => "idle",
            WorkflowPhase::ImageSelected => "image selected",
            WorkflowPhase::Analyzing => "analyzing",
            WorkflowPhase::Analyzed => "analyzed",
            WorkflowPhase::Answering => "answering",
            WorkflowPhase::Answered => "answered",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInfo {
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: usize,
}

/// Read-only view of the workflow, as returned to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSnapshot {
    pub phase: WorkflowPhase,
    pub image: Option<ImageInfo>,
    pub description: Option<String>,
    pub question: String,
    pub answer: Option<String>,
    pub analysis_in_flight: bool,
    pub answer_in_flight: bool,
    pub error: Option<String>,
    /// Upload bound shown by the UI.
    pub max_image_size_mb: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_type_prefers_declared_type() {
        let file = ImageFile::new("photo.bin", Some("IMAGE/PNG".to_string()), vec![1]);
        assert_eq!(file.mime_type(), "image/png");
        assert!(file.is_image());
    }

    #[test]
    fn test_mime_type_guessed_from_extension() {
        let file = ImageFile::new("holiday.jpg", None, vec![1]);
        assert_eq!(file.mime_type(), "image/jpeg");

        let file = ImageFile::new("notes.txt", Some("  ".to_string()), vec![1]);
        assert_eq!(file.mime_type(), "text/plain");
        assert!(!file.is_image());

        let file = ImageFile::new("no_extension", None, vec![1]);
        assert_eq!(file.mime_type(), "application/octet-stream");
    }

    #[test]
    fn test_declared_type_parameters_are_dropped() {
        let file = ImageFile::new("a.png", Some("image/png; charset=binary".to_string()), vec![1, 2, 3]);
        assert_eq!(file.mime_type(), "image/png");
        assert_eq!(EncodedImage::encode(&file).as_data_url(), "data:image/png;base64,AQID");
    }

    #[test]
    fn test_malformed_declared_type_falls_back_to_extension() {
        let file = ImageFile::new("a.png", Some("image/png,evil".to_string()), vec![1, 2, 3]);
        assert_eq!(file.mime_type(), "image/png");
        assert_eq!(EncodedImage::encode(&file).as_data_url(), "data:image/png;base64,AQID");

        let file = ImageFile::new("a.txt", Some("image/png,evil".to_string()), vec![1]);
        assert!(!file.is_image());
    }

    #[test]
    fn test_encode_builds_data_url() {
        let file = ImageFile::new("dot.gif", Some("image/gif".to_string()), b"GIF89a".to_vec());
        let encoded = EncodedImage::encode(&file);

        assert_eq!(encoded.as_data_url(), "data:image/gif;base64,R0lGODlh");
        assert_eq!(encoded.mime_type(), "image/gif");
        assert_eq!(encoded.byte_len(), 6);
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let snapshot = WorkflowSnapshot {
            phase: WorkflowPhase::ImageSelected,
            image: None,
            description: None,
            question: String::new(),
            answer: None,
            analysis_in_flight: false,
            answer_in_flight: false,
            error: None,
            max_image_size_mb: 5,
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["phase"], "imageSelected");
        assert_eq!(json["analysisInFlight"], false);
        assert_eq!(json["maxImageSizeMb"], 5);
    }
}
