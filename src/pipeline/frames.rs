// pipeline/frames.rs
//
// Frame fetch + landmark detection for a single instant. Detection is
// CPU-bound and runs on the blocking pool; every failure is a skipped sample.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, warn};

use crate::collaborators::{FaceLandmarkDetector, FrameSource};
use crate::vision::FaceObservation;

pub struct FrameAnalyzer {
    frames: Arc<dyn FrameSource>,
    detector: Arc<dyn FaceLandmarkDetector>,
    analyzed: AtomicU64,
    skipped: AtomicU64,
}

impl FrameAnalyzer {
    pub fn new(frames: Arc<dyn FrameSource>, detector: Arc<dyn FaceLandmarkDetector>) -> Self {
        Self {
            frames,
            detector,
            analyzed: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        }
    }

    pub fn frame_source(&self) -> &Arc<dyn FrameSource> {
        &self.frames
    }

    /// Faces visible at `time`; empty when the frame or detection is unavailable
    pub async fn observe(&self, time: f64) -> Vec<FaceObservation> {
        let frame = match self.frames.frame_at(time).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!("No frame at {:.3}s, skipping", time);
                self.skipped.fetch_add(1, Ordering::Relaxed);
                return Vec::new();
            }
            Err(e) => {
                warn!("Frame fetch failed at {:.3}s: {}", time, e);
                self.skipped.fetch_add(1, Ordering::Relaxed);
                return Vec::new();
            }
        };

        let detector = Arc::clone(&self.detector);
        let result = tokio::task::spawn_blocking(move || detector.detect(&frame)).await;

        match result {
            Ok(Ok(observations)) => {
                self.analyzed.fetch_add(1, Ordering::Relaxed);
                observations
            }
            Ok(Err(e)) => {
                warn!("Face detection failed at {:.3}s: {}", time, e);
                self.skipped.fetch_add(1, Ordering::Relaxed);
                Vec::new()
            }
            Err(e) => {
                warn!("Detection task join error at {:.3}s: {}", time, e);
                self.skipped.fetch_add(1, Ordering::Relaxed);
                Vec::new()
            }
        }
    }

    pub fn analyzed_count(&self) -> u64 {
        self.analyzed.load(Ordering::Relaxed)
    }

    pub fn skipped_count(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }
}
