// collaborators/recorded.rs
//
// Collaborators replayed from a JSON session recording: the recognizer,
// diarizer and detector outputs captured from a real run, plus the video
// timeline they were captured on.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_FRAME_RATE;
use crate::error::CollaboratorError;
use crate::speech::{DiarizedSegment, Utterance};
use crate::vision::FaceObservation;

use super::{
    AudioSource, AudioStatus, Diarizer, FaceLandmarkDetector, FrameSource, SpeechRecognizer,
    VideoFrame, VideoInfo,
};

/// Detector output captured for one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedFrame {
    pub timestamp: f64,
    #[serde(default)]
    pub observations: Vec<FaceObservation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedVideo {
    pub duration_secs: f64,
    #[serde(default)]
    pub frame_rate: Option<f64>,
    #[serde(default = "default_dimension")]
    pub width: u32,
    #[serde(default = "default_dimension")]
    pub height: u32,
    /// Sorted by timestamp after loading
    pub frames: Vec<RecordedFrame>,
}

fn default_dimension() -> u32 {
    720
}

/// A complete recorded session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecording {
    /// Converted audio; absent when conversion failed
    #[serde(default)]
    pub audio_path: Option<PathBuf>,
    /// Recognizer output; absent when the recognizer was unavailable
    #[serde(default)]
    pub utterances: Option<Vec<Utterance>>,
    /// Diarizer output; absent when diarization failed
    #[serde(default)]
    pub segments: Option<Vec<DiarizedSegment>>,
    pub video: RecordedVideo,
}

impl SessionRecording {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read session recording {:?}", path))?;
        let session: SessionRecording = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid session recording in {:?}", path))?;
        let session = session.normalized()?;

        info!(
            "Loaded session {:?}: {} recorded frame(s), {:.1}s of video",
            path,
            session.video.frames.len(),
            session.video.duration_secs
        );
        Ok(session)
    }

    /// Sort frames and reject recordings the frame lookup cannot serve
    pub fn normalized(mut self) -> Result<Self> {
        if !(self.video.duration_secs >= 0.0) {
            return Err(anyhow!("video.duration_secs must be non-negative"));
        }
        if let Some(fps) = self.video.frame_rate {
            if fps <= 0.0 {
                return Err(anyhow!("video.frame_rate must be positive, got {}", fps));
            }
        }
        self.video
            .frames
            .sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        Ok(self)
    }

    fn frame_rate(&self) -> f64 {
        self.video.frame_rate.unwrap_or(DEFAULT_FRAME_RATE)
    }

    /// Recorded frame nearest `time`, if one lies within half a frame interval
    fn nearest_frame(&self, time: f64) -> Option<&RecordedFrame> {
        let frames = &self.video.frames;
        let tolerance = 0.5 / self.frame_rate();

        let idx = frames.partition_point(|f| f.timestamp < time);
        let candidates = [idx.checked_sub(1), Some(idx)];
        candidates
            .iter()
            .flatten()
            .filter_map(|&i| frames.get(i))
            .filter(|f| (f.timestamp - time).abs() <= tolerance)
            .min_by(|a, b| {
                (a.timestamp - time)
                    .abs()
                    .total_cmp(&(b.timestamp - time).abs())
            })
    }
}

#[async_trait]
impl AudioSource for SessionRecording {
    async fn status(&self) -> AudioStatus {
        match &self.audio_path {
            Some(path) => AudioStatus::Ready(path.clone()),
            None => AudioStatus::Failed("session has no converted audio".to_string()),
        }
    }
}

#[async_trait]
impl SpeechRecognizer for SessionRecording {
    async fn recognize(&self, audio_path: &Path) -> Result<Vec<Utterance>, CollaboratorError> {
        if self.audio_path.is_none() {
            return Err(CollaboratorError::AudioMissing(audio_path.display().to_string()));
        }
        self.utterances.clone().ok_or_else(|| {
            CollaboratorError::RecognizerUnavailable("no recognizer output recorded".to_string())
        })
    }
}

#[async_trait]
impl Diarizer for SessionRecording {
    async fn diarize(
        &self,
        _audio_path: &Path,
        speaker_count_hint: usize,
    ) -> Result<Vec<DiarizedSegment>, CollaboratorError> {
        debug!("Replaying diarization (hint: {} speakers)", speaker_count_hint);
        self.segments.clone().ok_or_else(|| {
            CollaboratorError::DiarizationFailed("no diarization output recorded".to_string())
        })
    }
}

#[async_trait]
impl FrameSource for SessionRecording {
    async fn video_info(&self) -> Result<VideoInfo, CollaboratorError> {
        Ok(VideoInfo {
            duration_secs: self.video.duration_secs,
            frame_rate: self.video.frame_rate,
        })
    }

    async fn frame_at(&self, time: f64) -> Result<Option<VideoFrame>, CollaboratorError> {
        let Some(frame) = self.nearest_frame(time) else {
            return Ok(None);
        };

        // The "pixels" of a replayed frame are the detector output captured for it
        let payload = serde_json::to_vec(&frame.observations).map_err(|e| {
            CollaboratorError::FrameDecode {
                timestamp: time,
                message: e.to_string(),
            }
        })?;

        Ok(Some(VideoFrame {
            pts: frame.timestamp,
            width: self.video.width,
            height: self.video.height,
            pixels: Bytes::from(payload),
        }))
    }
}

/// Detector for frames produced by a [`SessionRecording`]
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordedDetector;

impl FaceLandmarkDetector for RecordedDetector {
    fn detect(&self, frame: &VideoFrame) -> Result<Vec<FaceObservation>, CollaboratorError> {
        serde_json::from_slice(&frame.pixels).map_err(|e| {
            CollaboratorError::Detection(format!("frame at {:.3}s: {}", frame.pts, e))
        })
    }
}
