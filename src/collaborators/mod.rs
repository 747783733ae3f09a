//! External collaborator interfaces
//!
//! Audio conversion, speech recognition, diarization, frame decoding and face
//! landmark detection all live outside this crate. The pipeline only sees
//! them through these traits.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::CollaboratorError;
use crate::speech::{DiarizedSegment, Utterance};
use crate::vision::FaceObservation;

pub mod recorded;

pub use recorded::SessionRecording;

/// State of the converted audio track
#[derive(Debug, Clone, PartialEq)]
pub enum AudioStatus {
    /// Conversion still running
    Pending,
    /// Mono waveform ready at this path
    Ready(PathBuf),
    /// No usable audio can be produced
    Failed(String),
}

/// Source of the mono waveform the speech stages run on
#[async_trait]
pub trait AudioSource: Send + Sync {
    async fn status(&self) -> AudioStatus;
}

/// Speech-to-text engine
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Ordered utterances for the audio at `audio_path`
    async fn recognize(&self, audio_path: &Path) -> Result<Vec<Utterance>, CollaboratorError>;
}

/// Speaker diarization engine
#[async_trait]
pub trait Diarizer: Send + Sync {
    async fn diarize(
        &self,
        audio_path: &Path,
        speaker_count_hint: usize,
    ) -> Result<Vec<DiarizedSegment>, CollaboratorError>;
}

/// Basic properties of the video track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub duration_secs: f64,
    /// Nominal frame rate, when the container reports one
    pub frame_rate: Option<f64>,
}

/// A decoded frame
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    /// Presentation timestamp in seconds
    pub pts: f64,
    pub width: u32,
    pub height: u32,
    /// Decoder-specific pixel payload; opaque to this crate
    pub pixels: Bytes,
}

/// Video frame decoder
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn video_info(&self) -> Result<VideoInfo, CollaboratorError>;

    /// Frame presented at `time`. `Ok(None)` means no frame is available there.
    async fn frame_at(&self, time: f64) -> Result<Option<VideoFrame>, CollaboratorError>;
}

/// Face + lip landmark detector. CPU-bound; callers run it off the async executor.
pub trait FaceLandmarkDetector: Send + Sync {
    fn detect(&self, frame: &VideoFrame) -> Result<Vec<FaceObservation>, CollaboratorError>;
}
