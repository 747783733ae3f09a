// pipeline/progress.rs
//
// Stage reporting for a running fusion pass.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionStage {
    Idle,
    WaitingForAudio,
    Recognizing,
    Diarizing,
    TrackingFaces,
    Matching,
    Complete,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionProgress {
    pub stage: FusionStage,
    pub message: String,
}

impl Default for FusionProgress {
    fn default() -> Self {
        Self {
            stage: FusionStage::Idle,
            message: String::new(),
        }
    }
}

/// Sending half of the progress channel. Sends never fail; a run without
/// subscribers simply overwrites the latest value.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    sender: watch::Sender<FusionProgress>,
}

impl ProgressReporter {
    pub fn new() -> (Self, watch::Receiver<FusionProgress>) {
        let (sender, receiver) = watch::channel(FusionProgress::default());
        (Self { sender }, receiver)
    }

    pub fn report(&self, stage: FusionStage, message: impl Into<String>) {
        let progress = FusionProgress {
            stage,
            message: message.into(),
        };
        self.sender.send_replace(progress);
    }

    pub fn subscribe(&self) -> watch::Receiver<FusionProgress> {
        self.sender.subscribe()
    }
}
