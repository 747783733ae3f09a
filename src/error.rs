//! Error types for the fusion pipeline
//!
//! `CollaboratorError` is raised at external call sites and is almost always
//! absorbed into an empty or partial stage result. `FusionError` is reserved for
//! conditions that stop the pipeline.

use thiserror::Error;

/// Failures reported by the external collaborators (recognizer, diarizer, video, detector)
#[derive(Debug, Clone, Error)]
pub enum CollaboratorError {
    /// The speech recognizer is not available on this system
    #[error("Speech recognizer unavailable: {0}")]
    RecognizerUnavailable(String),
    /// The recognizer was handed an audio path that does not resolve
    #[error("Audio missing: {0}")]
    AudioMissing(String),
    #[error("Diarization failed: {0}")]
    DiarizationFailed(String),
    #[error("Frame decode failed at {timestamp:.3}s: {message}")]
    FrameDecode { timestamp: f64, message: String },
    #[error("Face detection failed: {0}")]
    Detection(String),
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for CollaboratorError {
    fn from(e: std::io::Error) -> Self {
        CollaboratorError::Io(e.to_string())
    }
}

/// Conditions that abort or reject a fusion run
#[derive(Debug, Error)]
pub enum FusionError {
    /// No resolvable audio source; the pipeline cannot start
    #[error("No audio source available: {0}")]
    AudioUnavailable(String),
    /// The matched-speaker snapshot is published exactly once per run
    #[error("Fusion result already published")]
    AlreadyPublished,
    #[error("Invalid configuration: {0}")]
    Config(String),
}
