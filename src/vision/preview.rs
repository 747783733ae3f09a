// vision/preview.rs
//
// Advisory per-frame speaker overlay for live playback. It looks at one display
// frame at a time, keeps no history and never feeds the tracker or the fusion
// result.

use serde::{Deserialize, Serialize};

use crate::config::PreviewConfig;
use crate::geometry::{NormalizedRect, ViewRect};

use super::landmarks::vertical_span;
use super::types::FaceObservation;

/// A face box to draw on the current frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    pub bounding_box: NormalizedRect,
    /// Drawn as the speaker (green) instead of a listener (red)
    pub is_speaker: bool,
}

impl FaceBox {
    pub fn view_rect(&self, view_width: f64, view_height: f64) -> ViewRect {
        self.bounding_box.to_view_rect(view_width, view_height)
    }
}

/// Classifies faces in a display frame by raw lip separation in pixels
#[derive(Debug, Clone)]
pub struct PreviewClassifier {
    lip_movement_threshold: f64,
}

impl PreviewClassifier {
    pub fn new(config: &PreviewConfig) -> Self {
        Self {
            lip_movement_threshold: config.lip_movement_threshold,
        }
    }

    /// Outer-lip vertical span in pixels of a frame `frame_height` pixels tall
    pub fn lip_distance(observation: &FaceObservation, frame_height: u32) -> f64 {
        match observation.outer_lips.as_deref() {
            Some(outer) => {
                vertical_span(outer) * observation.bounding_box.height * frame_height as f64
            }
            None => 0.0,
        }
    }

    pub fn classify(&self, observations: &[FaceObservation], frame_height: u32) -> Vec<FaceBox> {
        observations
            .iter()
            .map(|obs| FaceBox {
                bounding_box: obs.bounding_box,
                is_speaker: Self::lip_distance(obs, frame_height) > self.lip_movement_threshold,
            })
            .collect()
    }
}

impl Default for PreviewClassifier {
    fn default() -> Self {
        Self::new(&PreviewConfig::default())
    }
}
