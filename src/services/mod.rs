pub mod ai_service; // Model abstraction
pub mod insight; // Description and Q&A services
pub mod openrouter; // OpenRouter AI service

#[cfg(test)]
pub mod mock;

pub use ai_service::VisionModel;
pub use insight::{ImageDescriptionService, ImageQaService};
pub use openrouter::OpenRouterService;
