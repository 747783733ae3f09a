//! Fusion Configuration and Constants
//!
//! Every threshold below is a tuned empirical value. The serde structs default
//! to them so a JSON config file only needs to name what it overrides.

use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::FusionError;

// Face tracking
pub const TARGET_TRACKING_SAMPLES: usize = 300;
pub const TRACK_MATCH_DISTANCE: f64 = 0.15;
pub const TRACK_MAX_IDLE_SECS: f64 = 1.0;
pub const SMOOTHING_KEEP: f64 = 0.7;
pub const SMOOTHING_NEW: f64 = 0.3;
pub const SPEAKING_FLOOR: f64 = 0.05;
pub const SPEAKING_RATIO: f64 = 1.5;
pub const MIN_TRACK_SAMPLES: usize = 10;
pub const DEFAULT_FRAME_RATE: f64 = 30.0;

// Sample-level scoring
pub const IOU_MAX_TIME_DELTA: f64 = 0.5;
pub const WEIGHT_IOU: f64 = 0.3;
pub const WEIGHT_TEMPORAL: f64 = 0.2;
pub const WEIGHT_MOUTH: f64 = 0.2;
pub const WEIGHT_SEGMENT: f64 = 0.2;
pub const WEIGHT_SPATIAL: f64 = 0.1;
pub const SEGMENT_AFFINITY_NORM: f64 = 100.0;
pub const SPATIAL_POINTS_PER_SEGMENT: usize = 5;
pub const SPATIAL_POSITION_WEIGHT: f64 = 0.7;
pub const SPATIAL_TIME_WEIGHT: f64 = 0.3;
pub const SCORE_FLOOR: f64 = 0.5;

// Utterance sampling
pub const MIN_UTTERANCE_SECS: f64 = 0.3;
pub const SAMPLE_STEP_SECS: f64 = 0.25;
pub const MIN_MOUTH_OPENNESS: f64 = 0.03;

// Utterance-to-speaker matching
pub const MIN_MATCH_SECS: f64 = 0.5;
pub const SPEAKER_COUNT_HINT: usize = 2;

// Pipeline
pub const AUDIO_POLL_INTERVAL_MS: u64 = 100;

// Preview overlay
pub const LIP_MOVEMENT_THRESHOLD_PX: f64 = 1.0;

/// Face track building parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Approximate number of frames sampled across the whole video
    pub target_samples: usize,
    /// Max center distance (normalized) between a detection and a track
    pub match_distance: f64,
    /// A track idle longer than this stops accepting detections
    pub max_idle_secs: f64,
    pub smoothing_keep: f64,
    pub smoothing_new: f64,
    /// Mouth openness must exceed max(floor, ratio * running average)
    pub speaking_floor: f64,
    pub speaking_ratio: f64,
    /// Tracks shorter than this are discarded at finalization
    pub min_track_samples: usize,
    /// Used when the video does not report a nominal frame rate
    pub default_frame_rate: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            target_samples: TARGET_TRACKING_SAMPLES,
            match_distance: TRACK_MATCH_DISTANCE,
            max_idle_secs: TRACK_MAX_IDLE_SECS,
            smoothing_keep: SMOOTHING_KEEP,
            smoothing_new: SMOOTHING_NEW,
            speaking_floor: SPEAKING_FLOOR,
            speaking_ratio: SPEAKING_RATIO,
            min_track_samples: MIN_TRACK_SAMPLES,
            default_frame_rate: DEFAULT_FRAME_RATE,
        }
    }
}

/// Weights and gates of the face/speaker affinity scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub iou_max_time_delta: f64,
    pub weight_iou: f64,
    pub weight_temporal: f64,
    pub weight_mouth: f64,
    pub weight_segment: f64,
    pub weight_spatial: f64,
    pub segment_affinity_norm: f64,
    pub spatial_points_per_segment: usize,
    pub spatial_position_weight: f64,
    pub spatial_time_weight: f64,
    /// Scores at or below the floor never produce a vote
    pub score_floor: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            iou_max_time_delta: IOU_MAX_TIME_DELTA,
            weight_iou: WEIGHT_IOU,
            weight_temporal: WEIGHT_TEMPORAL,
            weight_mouth: WEIGHT_MOUTH,
            weight_segment: WEIGHT_SEGMENT,
            weight_spatial: WEIGHT_SPATIAL,
            segment_affinity_norm: SEGMENT_AFFINITY_NORM,
            spatial_points_per_segment: SPATIAL_POINTS_PER_SEGMENT,
            spatial_position_weight: SPATIAL_POSITION_WEIGHT,
            spatial_time_weight: SPATIAL_TIME_WEIGHT,
            score_floor: SCORE_FLOOR,
        }
    }
}

/// Per-utterance frame sampling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssociationConfig {
    pub min_utterance_secs: f64,
    pub sample_step_secs: f64,
    /// Detections at or below this openness are treated as silent
    pub min_mouth_openness: f64,
}

impl Default for AssociationConfig {
    fn default() -> Self {
        Self {
            min_utterance_secs: MIN_UTTERANCE_SECS,
            sample_step_secs: SAMPLE_STEP_SECS,
            min_mouth_openness: MIN_MOUTH_OPENNESS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Utterances shorter than this are never bound to a speaker
    pub min_match_secs: f64,
    /// Passed to the diarizer
    pub speaker_count_hint: usize,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            min_match_secs: MIN_MATCH_SECS,
            speaker_count_hint: SPEAKER_COUNT_HINT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub audio_poll_interval_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            audio_poll_interval_ms: AUDIO_POLL_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Outer-lip span in pixels above which a face box is drawn as speaking
    pub lip_movement_threshold: f64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            lip_movement_threshold: LIP_MOVEMENT_THRESHOLD_PX,
        }
    }
}

/// Complete configuration of a fusion run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub tracker: TrackerConfig,
    pub scoring: ScoringConfig,
    pub association: AssociationConfig,
    pub speech: SpeechConfig,
    pub pipeline: PipelineConfig,
    pub preview: PreviewConfig,
}

impl FusionConfig {
    /// Load a JSON config file. Missing sections and fields keep their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: FusionConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid fusion config in {:?}", path))?;
        config
            .validate()
            .with_context(|| format!("Rejected fusion config in {:?}", path))?;
        info!("Loaded fusion config from {:?}", path);
        Ok(config)
    }

    /// Reject values that would stall or divide by zero in the sampling loops
    pub fn validate(&self) -> std::result::Result<(), FusionError> {
        if self.tracker.target_samples == 0 {
            return Err(FusionError::Config("tracker.target_samples must be positive".into()));
        }
        if self.tracker.default_frame_rate <= 0.0 {
            return Err(FusionError::Config("tracker.default_frame_rate must be positive".into()));
        }
        if self.association.sample_step_secs <= 0.0 {
            return Err(FusionError::Config("association.sample_step_secs must be positive".into()));
        }
        if self.scoring.iou_max_time_delta <= 0.0 {
            return Err(FusionError::Config("scoring.iou_max_time_delta must be positive".into()));
        }
        if self.scoring.segment_affinity_norm <= 0.0 {
            return Err(FusionError::Config("scoring.segment_affinity_norm must be positive".into()));
        }
        if self.scoring.spatial_points_per_segment < 2 {
            return Err(FusionError::Config("scoring.spatial_points_per_segment must be at least 2".into()));
        }
        Ok(())
    }
}
