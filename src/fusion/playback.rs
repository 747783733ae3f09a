// fusion/playback.rs
//
// Per-query "who is talking now" projection over a published snapshot. The
// snapshot itself is shared read-only; the tracker keeps its own copy of the
// speaker list and only ever rewrites the speaking flags.

use std::sync::Arc;

use crate::speech::SpeakerId;

use super::result::{FusionSnapshot, MatchedSpeaker};

/// Set every speaker's flag for time `t`. Segments and assignments are left untouched.
pub fn apply_speaking_flags(speakers: &mut [MatchedSpeaker], time: f64) {
    for speaker in speakers.iter_mut() {
        speaker.is_currently_speaking = speaker.is_speaking_at(time);
    }
}

/// Ids of every speaker active at `t`, ascending
pub fn active_speaker_ids(speakers: &[MatchedSpeaker], time: f64) -> Vec<SpeakerId> {
    speakers
        .iter()
        .filter(|s| s.is_speaking_at(time))
        .map(|s| s.speaker_id)
        .collect()
}

#[derive(Debug, Clone)]
pub struct PlaybackStateTracker {
    snapshot: Arc<FusionSnapshot>,
    speakers: Vec<MatchedSpeaker>,
    last_query: Option<f64>,
}

impl PlaybackStateTracker {
    pub fn new(snapshot: Arc<FusionSnapshot>) -> Self {
        let speakers = snapshot.speakers.clone();
        Self {
            snapshot,
            speakers,
            last_query: None,
        }
    }

    pub fn snapshot(&self) -> &Arc<FusionSnapshot> {
        &self.snapshot
    }

    /// Recompute the flags for playback time `t`
    pub fn update(&mut self, time: f64) -> &[MatchedSpeaker] {
        apply_speaking_flags(&mut self.speakers, time);
        self.last_query = Some(time);
        &self.speakers
    }

    pub fn speakers(&self) -> &[MatchedSpeaker] {
        &self.speakers
    }

    pub fn last_query(&self) -> Option<f64> {
        self.last_query
    }

    /// Speakers flagged by the last update
    pub fn active_speakers(&self) -> impl Iterator<Item = &MatchedSpeaker> {
        self.speakers.iter().filter(|s| s.is_currently_speaking)
    }

    /// First speaker, in id order, whose segment contains `t`
    pub fn current_speaker(&self, time: f64) -> Option<&MatchedSpeaker> {
        self.speakers.iter().find(|s| s.is_speaking_at(time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::speech::SpeakerSegment;
    use crate::fusion::result::AssignmentSource;

    fn speaker(id: SpeakerId, segments: &[(f64, f64)]) -> MatchedSpeaker {
        MatchedSpeaker {
            speaker_id: id,
            face_id: Some(id as usize),
            position: Some(Point::new(0.5, 0.5)),
            segments: segments.iter().map(|&(s, e)| SpeakerSegment::new(s, e)).collect(),
            source: AssignmentSource::Votes,
            is_currently_speaking: false,
        }
    }

    fn tracker() -> PlaybackStateTracker {
        let snapshot = FusionSnapshot::new(
            Vec::new(),
            vec![
                speaker(0, &[(0.0, 5.0), (6.0, 8.0)]),
                speaker(1, &[(5.0, 10.0)]),
                speaker(2, &[(12.0, 13.0)]),
            ],
            0,
        );
        PlaybackStateTracker::new(Arc::new(snapshot))
    }

    #[test]
    fn test_overlapping_speakers_both_flagged() {
        let mut tracker = tracker();
        tracker.update(7.0);

        let active: Vec<SpeakerId> = tracker.active_speakers().map(|s| s.speaker_id).collect();
        assert_eq!(active, vec![0, 1]);
        assert_eq!(active_speaker_ids(tracker.speakers(), 7.0), vec![0, 1]);
        assert_eq!(tracker.current_speaker(7.0).map(|s| s.speaker_id), Some(0));
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let mut tracker = tracker();
        let flags: Vec<bool> = tracker.update(5.0).iter().map(|s| s.is_currently_speaking).collect();
        assert_eq!(flags, vec![true, true, false]);

        let flags: Vec<bool> = tracker.update(13.0).iter().map(|s| s.is_currently_speaking).collect();
        assert_eq!(flags, vec![false, false, true]);

        assert!(tracker.update(11.0).iter().all(|s| !s.is_currently_speaking));
        assert!(tracker.current_speaker(11.0).is_none());
    }

    #[test]
    fn test_update_is_idempotent_and_preserves_assignments() {
        let mut tracker = tracker();
        let first = tracker.update(7.0).to_vec();
        let second = tracker.update(7.0).to_vec();
        assert_eq!(first, second);
        assert_eq!(tracker.last_query(), Some(7.0));

        for (live, published) in tracker.speakers().iter().zip(&tracker.snapshot().speakers) {
            assert_eq!(live.segments, published.segments);
            assert_eq!(live.face_id, published.face_id);
            assert!(!published.is_currently_speaking);
        }
    }
}
