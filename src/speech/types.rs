// speech/types.rs
//
// Utterances from the recognizer and speaker segments from the diarizer.

use serde::{Deserialize, Serialize};

/// Speaker label assigned by the diarizer (session-local, not an identity)
pub type SpeakerId = u32;

/// A recognized span of speech
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub text: String,
    /// Start time in seconds
    pub start_time: f64,
    /// End time in seconds
    pub end_time: f64,
}

impl Utterance {
    pub fn new(text: impl Into<String>, start_time: f64, end_time: f64) -> Self {
        Self {
            text: text.into(),
            start_time,
            end_time,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Raw diarizer output row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiarizedSegment {
    pub speaker_id: SpeakerId,
    pub start: f64,
    pub end: f64,
}

/// A time range attributed to one speaker
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeakerSegment {
    /// Start time in seconds
    pub start_time: f64,
    /// End time in seconds, never before `start_time`
    pub end_time: f64,
}

impl SpeakerSegment {
    /// Build a segment; an inverted range collapses to zero length at `start`
    pub fn new(start_time: f64, end_time: f64) -> Self {
        Self {
            start_time,
            end_time: end_time.max(start_time),
        }
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    pub fn midpoint(&self) -> f64 {
        (self.start_time + self.end_time) / 2.0
    }

    /// Inclusive on both ends
    pub fn contains(&self, time: f64) -> bool {
        self.start_time <= time && time <= self.end_time
    }

    /// Seconds shared with `[start, end]`
    pub fn overlap(&self, start: f64, end: f64) -> f64 {
        let overlap_start = start.max(self.start_time);
        let overlap_end = end.min(self.end_time);
        (overlap_end - overlap_start).max(0.0)
    }
}

/// All segments of one diarized speaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerProfile {
    pub speaker_id: SpeakerId,
    /// Segments in diarization order
    pub segments: Vec<SpeakerSegment>,
    /// Voice embedding, when the diarizer provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl SpeakerProfile {
    pub fn new(speaker_id: SpeakerId, segments: Vec<SpeakerSegment>) -> Self {
        Self {
            speaker_id,
            segments,
            embedding: None,
        }
    }

    /// Total seconds of this speaker inside `[start, end]`
    pub fn overlap(&self, start: f64, end: f64) -> f64 {
        self.segments.iter().map(|seg| seg.overlap(start, end)).sum()
    }

    pub fn is_speaking_at(&self, time: f64) -> bool {
        self.segments.iter().any(|seg| seg.contains(time))
    }
}

/// An utterance bound to the speaker it overlaps most
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedUtterance {
    pub utterance: Utterance,
    pub speaker_id: SpeakerId,
    /// Seconds of overlap with the chosen speaker's segments
    pub overlap_secs: f64,
}
