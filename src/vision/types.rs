// vision/types.rs
//
// Face detections, per-sample track history and finalized face profiles.

use serde::{Deserialize, Serialize};

use crate::geometry::{NormalizedRect, Point};

/// Stable arena index of a face track. Assigned in allocation order and kept
/// by the profile the track is finalized into.
pub type TrackId = usize;

/// One face returned by the landmark detector for a single frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceObservation {
    /// Face box, normalized to the frame
    pub bounding_box: NormalizedRect,
    /// Inner lip contour, normalized to the face box
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner_lips: Option<Vec<Point>>,
    /// Outer lip contour, normalized to the face box
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outer_lips: Option<Vec<Point>>,
}

impl FaceObservation {
    pub fn new(bounding_box: NormalizedRect) -> Self {
        Self {
            bounding_box,
            inner_lips: None,
            outer_lips: None,
        }
    }

    pub fn with_lips(mut self, inner: Vec<Point>, outer: Vec<Point>) -> Self {
        self.inner_lips = Some(inner);
        self.outer_lips = Some(outer);
        self
    }

    pub fn center(&self) -> Point {
        self.bounding_box.center()
    }

    /// Lip-derived mouth openness, 0.0 without landmarks
    pub fn mouth_openness(&self) -> f64 {
        super::landmarks::mouth_openness(
            &self.bounding_box,
            self.inner_lips.as_deref(),
            self.outer_lips.as_deref(),
        )
    }
}

/// A single tracked detection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceSample {
    /// Seconds from the start of the video
    pub timestamp: f64,
    pub bounding_box: NormalizedRect,
    pub mouth_openness: f64,
    pub is_speaking: bool,
}

impl FaceSample {
    pub fn center(&self) -> Point {
        self.bounding_box.center()
    }
}

/// Finalized face track. Immutable once produced by the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceProfile {
    pub id: TrackId,
    /// Samples in strictly increasing timestamp order
    pub samples: Vec<FaceSample>,
    pub mean_position: Point,
    pub mean_mouth_openness: f64,
}

impl FaceProfile {
    /// Build a profile from a track's history. Returns `None` for an empty history.
    pub fn from_samples(id: TrackId, samples: Vec<FaceSample>) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let count = samples.len() as f64;
        let (sum_x, sum_y, sum_mouth) = samples.iter().fold((0.0, 0.0, 0.0), |acc, s| {
            let c = s.center();
            (acc.0 + c.x, acc.1 + c.y, acc.2 + s.mouth_openness)
        });

        Some(Self {
            id,
            samples,
            mean_position: Point::new(sum_x / count, sum_y / count),
            mean_mouth_openness: sum_mouth / count,
        })
    }

    /// Sample whose timestamp is nearest to `time`; the earlier one on a tie
    pub fn closest_sample(&self, time: f64) -> Option<&FaceSample> {
        let idx = self.samples.partition_point(|s| s.timestamp < time);
        let before = idx.checked_sub(1).and_then(|i| self.samples.get(i));
        let after = self.samples.get(idx);

        match (before, after) {
            (Some(b), Some(a)) => {
                if (time - b.timestamp).abs() <= (a.timestamp - time).abs() {
                    Some(b)
                } else {
                    Some(a)
                }
            }
            (Some(b), None) => Some(b),
            (None, Some(a)) => Some(a),
            (None, None) => None,
        }
    }

    /// Samples with timestamps inside `[start, end]`
    pub fn samples_between(&self, start: f64, end: f64) -> impl Iterator<Item = &FaceSample> {
        let from = self.samples.partition_point(|s| s.timestamp < start);
        self.samples[from..]
            .iter()
            .take_while(move |s| s.timestamp <= end)
    }

    pub fn first_seen(&self) -> f64 {
        self.samples.first().map(|s| s.timestamp).unwrap_or_default()
    }

    pub fn last_seen(&self) -> f64 {
        self.samples.last().map(|s| s.timestamp).unwrap_or_default()
    }

    pub fn speaking_sample_count(&self) -> usize {
        self.samples.iter().filter(|s| s.is_speaking).count()
    }

    pub fn summary(&self) -> FaceSummary {
        FaceSummary {
            id: self.id,
            mean_position: self.mean_position,
            mean_mouth_openness: self.mean_mouth_openness,
            sample_count: self.samples.len(),
            speaking_samples: self.speaking_sample_count(),
            first_seen: self.first_seen(),
            last_seen: self.last_seen(),
        }
    }
}

/// Compact description of a face profile for reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceSummary {
    pub id: TrackId,
    pub mean_position: Point,
    pub mean_mouth_openness: f64,
    pub sample_count: usize,
    pub speaking_samples: usize,
    pub first_seen: f64,
    pub last_seen: f64,
}
