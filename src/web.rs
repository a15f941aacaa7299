use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::WorkflowError;
use crate::handlers::Orchestrator;
use crate::models::WorkflowSnapshot;

/// Body of `PUT /api/question` and `POST /api/question`.
#[derive(Debug, Deserialize, Serialize)]
pub struct QuestionRequest {
    pub question: String,
}

/// Error body: the message plus the state the workflow is left in.
#[derive(Debug, Deserialize, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub state: WorkflowSnapshot,
}

impl ErrorBody {
    pub fn new(orchestrator: &Arc<Orchestrator>, error: &WorkflowError) -> Self {
        Self {
            error: error.to_string(),
            state: orchestrator.snapshot(),
        }
    }
}

pub mod server {
    use super::*;
    use axum::{
        extract::{DefaultBodyLimit, Multipart, State},
        http::StatusCode,
        response::{Html, IntoResponse, Response},
        routing::{get, post},
        Json, Router,
    };
    use tower_http::limit::RequestBodyLimitLayer;

    use crate::models::ImageFile;

    const IMAGE_FIELD: &str = "image";

    pub struct AppState {
        pub orchestrator: Arc<Orchestrator>,
    }

    pub struct ApiError {
        status: StatusCode,
        body: ErrorBody,
    }

    impl ApiError {
        fn from_workflow(orchestrator: &Arc<Orchestrator>, error: WorkflowError) -> Self {
            let status = if error.is_validation() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::BAD_GATEWAY
            };
            Self {
                status,
                body: ErrorBody::new(orchestrator, &error),
            }
        }
    }

    impl IntoResponse for ApiError {
        fn into_response(self) -> Response {
            (self.status, Json(self.body)).into_response()
        }
    }

    type ApiResult = Result<Json<WorkflowSnapshot>, ApiError>;

    pub fn create_router(orchestrator: Arc<Orchestrator>, max_image_mb: usize) -> Router {
        let state = Arc::new(AppState { orchestrator });

        // Room for oversized uploads to reach validation instead of a bare 413.
        let body_limit = max_image_mb.saturating_mul(2 * 1024 * 1024);

        Router::new()
            .route("/", get(index_page))
            .route("/health", get(health_check))
            .route("/api/state", get(get_state))
            .route("/api/image", post(upload_image))
            .route("/api/analyze", post(analyze_image))
            .route("/api/question", post(ask_question).put(update_question))
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(body_limit))
            .with_state(state)
    }

    async fn index_page() -> Html<&'static str> {
        Html(include_str!("../static/index.html"))
    }

    async fn health_check() -> &'static str {
        "OK"
    }

    async fn get_state(State(state): State<Arc<AppState>>) -> Json<WorkflowSnapshot> {
        Json(state.orchestrator.snapshot())
    }

    async fn upload_image(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> ApiResult {
        let orchestrator = &state.orchestrator;
        let read_error = |e: axum::extract::multipart::MultipartError| {
            log::error!("❌ Failed to read upload: {}", e);
            ApiError::from_workflow(
                orchestrator,
                WorkflowError::validation(format!("Failed to read upload: {}", e)),
            )
        };

        while let Some(field) = multipart.next_field().await.map_err(read_error)? {
            if field.name() != Some(IMAGE_FIELD) {
                continue;
            }

            let file_name = field.file_name().unwrap_or("upload").to_string();
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.map_err(read_error)?;
            log::info!("📥 Upload received: {} ({} bytes, {:?})", file_name, bytes.len(), content_type);

            let file = ImageFile::new(file_name, content_type, bytes.to_vec());
            return orchestrator
                .select_image(file)
                .map(Json)
                .map_err(|e| ApiError::from_workflow(orchestrator, e));
        }

        log::warn!("⚠️ Upload without an \"{}\" field", IMAGE_FIELD);
        Err(ApiError::from_workflow(
            orchestrator,
            WorkflowError::validation("Please choose an image file."),
        ))
    }

    async fn analyze_image(State(state): State<Arc<AppState>>) -> ApiResult {
        state
            .orchestrator
            .request_analysis()
            .await
            .map(Json)
            .map_err(|e| ApiError::from_workflow(&state.orchestrator, e))
    }

    async fn update_question(
        State(state): State<Arc<AppState>>,
        Json(request): Json<QuestionRequest>,
    ) -> Json<WorkflowSnapshot> {
        Json(state.orchestrator.set_question(&request.question))
    }

    async fn ask_question(
        State(state): State<Arc<AppState>>,
        Json(request): Json<QuestionRequest>,
    ) -> ApiResult {
        state
            .orchestrator
            .submit_question(&request.question)
            .await
            .map(Json)
            .map_err(|e| ApiError::from_workflow(&state.orchestrator, e))
    }
}
