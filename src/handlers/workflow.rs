use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::WorkflowError;
use crate::models::{EncodedImage, ImageFile, ImageInfo, WorkflowPhase, WorkflowSnapshot};
use crate::services::{ImageDescriptionService, ImageQaService, VisionModel};

const BYTES_PER_MB: usize = 1024 * 1024;

#[derive(Debug, Clone)]
struct SelectedImage {
    info: ImageInfo,
    encoded: EncodedImage,
}

/// Inputs of an analysis call, stamped with the generation that issued it.
#[derive(Debug, Clone)]
pub struct AnalysisTicket {
    pub generation: u64,
    pub image: EncodedImage,
}

/// Inputs of a question call, stamped with the generation that issued it.
#[derive(Debug, Clone)]
pub struct AnswerTicket {
    pub generation: u64,
    pub image: EncodedImage,
    pub description: String,
    pub question: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    /// The result belonged to a superseded request and was dropped.
    Stale,
}

/// The single workflow state of a session.
///
/// Every operation is synchronous. Model calls happen between a `begin_*`
/// and the matching `complete_*`; a completion is applied only if no
/// image selection, analysis or question was accepted in between.
#[derive(Debug)]
pub struct WorkflowState {
    phase: WorkflowPhase,
    image: Option<SelectedImage>,
    description: Option<String>,
    question: String,
    answer: Option<String>,
    last_error: Option<String>,
    generation: u64,
    max_image_mb: usize,
    max_image_bytes: usize,
}

impl WorkflowState {
    pub fn new(max_image_mb: usize) -> Self {
        Self {
            phase: WorkflowPhase::Idle,
            image: None,
            description: None,
            question: String::new(),
            answer: None,
            last_error: None,
            generation: 0,
            max_image_mb,
            max_image_bytes: max_image_mb.saturating_mul(BYTES_PER_MB),
        }
    }

    pub fn analysis_in_flight(&self) -> bool {
        self.phase == WorkflowPhase::Analyzing
    }

    pub fn answer_in_flight(&self) -> bool {
        self.phase == WorkflowPhase::Answering
    }

    fn reject(&mut self, err: WorkflowError) -> WorkflowError {
        log::warn!("⚠️ Rejected in phase '{}': {}", self.phase, err);
        self.last_error = Some(err.to_string());
        err
    }

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    pub fn select_image(&mut self, file: ImageFile) -> Result<(), WorkflowError> {
        if file.size() > self.max_image_bytes {
            return Err(self.reject(WorkflowError::validation(format!(
                "File is too large. Maximum size is {}MB.",
                self.max_image_mb
            ))));
        }
        if !file.is_image() {
            return Err(self.reject(WorkflowError::validation(
                "Invalid file type. Please upload an image.",
            )));
        }

        let info = ImageInfo {
            file_name: file.file_name.clone(),
            mime_type: file.mime_type(),
            size_bytes: file.size(),
        };
        let encoded = EncodedImage::encode(&file);

        self.next_generation();
        self.image = Some(SelectedImage { info, encoded });
        self.description = None;
        self.question.clear();
        self.answer = None;
        self.last_error = None;
        self.phase = WorkflowPhase::ImageSelected;

        log::info!("🖼️ Image selected: {} (generation {})", file.file_name, self.generation);
        Ok(())
    }

    pub fn set_question(&mut self, text: &str) {
        self.question = text.to_string();
    }

    pub fn begin_analysis(&mut self) -> Result<AnalysisTicket, WorkflowError> {
        let image = match self.image.as_ref().map(|selected| selected.encoded.clone()) {
            Some(image) => image,
            None => {
                return Err(self.reject(WorkflowError::validation("Please upload an image first.")))
            }
        };
        match self.phase {
            WorkflowPhase::Analyzing => {
                return Err(self.reject(WorkflowError::validation(
                    "Image analysis is already in progress.",
                )))
            }
            WorkflowPhase::Answering => {
                return Err(self.reject(WorkflowError::validation(
                    "Please wait for the current answer.",
                )))
            }
            _ => {}
        }

        let generation = self.next_generation();
        self.description = None;
        self.answer = None;
        self.last_error = None;
        self.phase = WorkflowPhase::Analyzing;

        log::info!("🔍 Analysis started (generation {})", generation);
        Ok(AnalysisTicket { generation, image })
    }

    pub fn complete_analysis(
        &mut self,
        ticket: &AnalysisTicket,
        result: Result<String, WorkflowError>,
    ) -> Completion {
        if ticket.generation != self.generation {
            log::debug!(
                "🗑️ Ignoring stale analysis result (generation {}, current {})",
                ticket.generation,
                self.generation
            );
            return Completion::Stale;
        }

        match result {
            Ok(description) => {
                log::info!("✅ Analysis finished (generation {})", ticket.generation);
                self.description = Some(description);
                self.phase = WorkflowPhase::Analyzed;
            }
            Err(err) => {
                log::warn!("⚠️ Analysis failed: {}", err);
                self.description = None;
                self.last_error = Some(err.to_string());
                self.phase = WorkflowPhase::ImageSelected;
            }
        }
        Completion::Applied
    }

    pub fn begin_answer(&mut self, text: &str) -> Result<AnswerTicket, WorkflowError> {
        if self.phase == WorkflowPhase::Answering {
            return Err(self.reject(WorkflowError::validation(
                "An answer is already being requested.",
            )));
        }

        let ready = matches!(self.phase, WorkflowPhase::Analyzed | WorkflowPhase::Answered);
        let inputs = match (&self.image, &self.description) {
            (Some(selected), Some(description)) if ready => {
                Some((selected.encoded.clone(), description.clone()))
            }
            _ => None,
        };
        let (image, description) = match inputs {
            Some(inputs) => inputs,
            None => {
                return Err(self.reject(WorkflowError::validation("Please analyze an image first.")))
            }
        };

        let question = text.trim();
        if question.is_empty() {
            return Err(self.reject(WorkflowError::validation("Please enter a question.")));
        }

        let generation = self.next_generation();
        self.question = text.to_string();
        self.answer = None;
        self.last_error = None;
        self.phase = WorkflowPhase::Answering;

        log::info!("💬 Question submitted (generation {}): {}", generation, question);
        Ok(AnswerTicket {
            generation,
            image,
            description,
            question: question.to_string(),
        })
    }

    pub fn complete_answer(
        &mut self,
        ticket: &AnswerTicket,
        result: Result<String, WorkflowError>,
    ) -> Completion {
        if ticket.generation != self.generation {
            log::debug!(
                "🗑️ Ignoring stale answer (generation {}, current {})",
                ticket.generation,
                self.generation
            );
            return Completion::Stale;
        }

        match result {
            Ok(answer) => {
                log::info!("✅ Answer received (generation {})", ticket.generation);
                self.answer = Some(answer);
                self.phase = WorkflowPhase::Answered;
            }
            Err(err) => {
                log::warn!("⚠️ Question answering failed: {}", err);
                self.answer = None;
                self.last_error = Some(err.to_string());
                self.phase = WorkflowPhase::Analyzed;
            }
        }
        Completion::Applied
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        WorkflowSnapshot {
            phase: self.phase,
            image: self.image.as_ref().map(|selected| selected.info.clone()),
            description: self.description.clone(),
            question: self.question.clone(),
            answer: self.answer.clone(),
            analysis_in_flight: self.analysis_in_flight(),
            answer_in_flight: self.answer_in_flight(),
            error: self.last_error.clone(),
            max_image_size_mb: self.max_image_mb,
        }
    }
}

/// Drives the workflow against the description and Q&A services.
///
/// The state lock is only held for the synchronous begin/complete steps,
/// never across a model call, so a new image selection can land while a
/// request is outstanding.
pub struct Orchestrator {
    state: Mutex<WorkflowState>,
    describer: ImageDescriptionService,
    qa: ImageQaService,
}

impl Orchestrator {
    pub fn new(model: Arc<dyn VisionModel>, max_image_mb: usize) -> Self {
        Self {
            state: Mutex::new(WorkflowState::new(max_image_mb)),
            describer: ImageDescriptionService::new(model.clone()),
            qa: ImageQaService::new(model),
        }
    }

    fn lock(&self) -> MutexGuard<'_, WorkflowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        self.lock().snapshot()
    }

    pub fn select_image(&self, file: ImageFile) -> Result<WorkflowSnapshot, WorkflowError> {
        let mut state = self.lock();
        state.select_image(file)?;
        Ok(state.snapshot())
    }

    pub fn set_question(&self, text: &str) -> WorkflowSnapshot {
        let mut state = self.lock();
        state.set_question(text);
        state.snapshot()
    }

    pub async fn request_analysis(&self) -> Result<WorkflowSnapshot, WorkflowError> {
        let ticket = {
            let mut state = self.lock();
            state.begin_analysis()?
        };

        let result = self.describer.describe(&ticket.image).await;

        let mut state = self.lock();
        let outcome = state.complete_analysis(&ticket, result.clone());
        match (outcome, result) {
            (Completion::Applied, Err(err)) => Err(err),
            _ => Ok(state.snapshot()),
        }
    }

    pub async fn submit_question(&self, text: &str) -> Result<WorkflowSnapshot, WorkflowError> {
        let ticket = {
            let mut state = self.lock();
            state.begin_answer(text)?
        };

        let result = self
            .qa
            .answer(&ticket.image, &ticket.description, &ticket.question)
            .await;

        let mut state = self.lock();
        let outcome = state.complete_answer(&ticket, result.clone());
        match (outcome, result) {
            (Completion::Applied, Err(err)) => Err(err),
            _ => Ok(state.snapshot()),
        }
    }
}
