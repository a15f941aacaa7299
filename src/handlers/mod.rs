pub mod workflow;

pub use workflow::Orchestrator;
