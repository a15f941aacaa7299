use anyhow::Result;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::oneshot;

use super::ai_service::{ModelPrompt, VisionModel};

/// Scripted model for tests: replays queued replies and records every prompt.
#[derive(Default)]
pub struct MockVisionModel {
    replies: Mutex<VecDeque<Result<serde_json::Value, String>>>,
    prompts: Mutex<Vec<ModelPrompt>>,
    hold: Mutex<Option<(oneshot::Sender<()>, oneshot::Receiver<()>)>>,
}

/// Gate for one held call: `started` fires once that call reaches the model,
/// and the call returns only after `release` is sent.
pub struct HeldCall {
    pub started: oneshot::Receiver<()>,
    pub release: oneshot::Sender<()>,
}

impl MockVisionModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, value: serde_json::Value) -> &Self {
        self.replies.lock().unwrap().push_back(Ok(value));
        self
    }

    pub fn fail(&self, message: &str) -> &Self {
        self.replies.lock().unwrap().push_back(Err(message.to_string()));
        self
    }

    /// Hold the next call until the returned gate is released.
    pub fn hold_next(&self) -> HeldCall {
        let (started_tx, started) = oneshot::channel();
        let (release, release_rx) = oneshot::channel();
        *self.hold.lock().unwrap() = Some((started_tx, release_rx));
        HeldCall { started, release }
    }

    pub fn prompts(&self) -> Vec<ModelPrompt> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl VisionModel for MockVisionModel {
    async fn generate(&self, prompt: &ModelPrompt) -> Result<serde_json::Value> {
        self.prompts.lock().unwrap().push(prompt.clone());
        let hold = self.hold.lock().unwrap().take();

        if let Some((started, release)) = hold {
            let _ = started.send(());
            let _ = release.await;
        }

        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => Err(anyhow::anyhow!("no scripted reply left")),
        }
    }
}
