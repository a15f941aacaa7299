use thiserror::Error;

/// User-visible failures of the image workflow.
///
/// The `Display` output is the message shown to the user and stored as the
/// current error of the workflow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    /// Local, synchronous rejection. Never reaches the model.
    #[error("{0}")]
    Validation(String),

    /// The model call failed or returned a result without the expected field.
    #[error("{0}")]
    ExternalService(String),
}

impl WorkflowError {
    pub fn validation(message: impl Into<String>) -> Self {
        WorkflowError::Validation(message.into())
    }

    pub fn external(message: impl Into<String>) -> Self {
        WorkflowError::ExternalService(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, WorkflowError::Validation(_))
    }
}
