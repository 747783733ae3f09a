// fusion/result.rs
//
// Published output of a fusion run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::Point;
use crate::speech::{SpeakerId, SpeakerSegment};
use crate::vision::{FaceSummary, TrackId};

/// Scale from normalized screen offset to panner units
const AUDIO_POSITION_SCALE: f64 = 10.0;

/// How a speaker's face was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentSource {
    /// Largest vote total from utterance sampling
    Votes,
    /// No votes; highest positive segment affinity
    Affinity,
    Unmatched,
}

/// A diarized speaker and the face assigned to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedSpeaker {
    pub speaker_id: SpeakerId,
    pub face_id: Option<TrackId>,
    /// Mean normalized position of the assigned face
    pub position: Option<Point>,
    pub segments: Vec<SpeakerSegment>,
    pub source: AssignmentSource,
    /// Recomputed for every playback query; never persisted meaningfully
    #[serde(default)]
    pub is_currently_speaking: bool,
}

impl MatchedSpeaker {
    /// Inclusive on segment bounds
    pub fn is_speaking_at(&self, time: f64) -> bool {
        self.segments.iter().any(|seg| seg.contains(time))
    }

    /// Position for a spatial audio panner: x to the right, y up, listener at the origin
    pub fn audio_position(&self) -> Option<[f64; 3]> {
        self.position.map(|p| {
            [
                (p.x - 0.5) * AUDIO_POSITION_SCALE,
                (0.5 - p.y) * AUDIO_POSITION_SCALE,
                0.0,
            ]
        })
    }
}

/// Immutable result of one fusion run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionSnapshot {
    pub run_id: Uuid,
    pub completed_at: DateTime<Utc>,
    pub faces: Vec<FaceSummary>,
    /// Ordered by ascending speaker id
    pub speakers: Vec<MatchedSpeaker>,
    pub utterances_matched: usize,
}

impl FusionSnapshot {
    pub fn new(faces: Vec<FaceSummary>, mut speakers: Vec<MatchedSpeaker>, utterances_matched: usize) -> Self {
        speakers.sort_by_key(|s| s.speaker_id);
        Self {
            run_id: Uuid::new_v4(),
            completed_at: Utc::now(),
            faces,
            speakers,
            utterances_matched,
        }
    }

    pub fn speaker(&self, speaker_id: SpeakerId) -> Option<&MatchedSpeaker> {
        self.speakers.iter().find(|s| s.speaker_id == speaker_id)
    }

    pub fn matched_count(&self) -> usize {
        self.speakers.iter().filter(|s| s.face_id.is_some()).count()
    }
}
