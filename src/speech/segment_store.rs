// speech/segment_store.rs
//
// Speaker profiles built from diarizer output, and utterance-to-speaker
// matching by total temporal overlap.

use std::collections::BTreeMap;

use log::{debug, info, warn};

use crate::config::SpeechConfig;

use super::types::{DiarizedSegment, MatchedUtterance, SpeakerId, SpeakerProfile, SpeakerSegment, Utterance};

/// Immutable store of the diarized speakers of one run
#[derive(Debug, Clone)]
pub struct SpeakerSegmentStore {
    config: SpeechConfig,
    /// Ordered by ascending speaker id
    profiles: Vec<SpeakerProfile>,
}

impl SpeakerSegmentStore {
    /// Group diarized segments by speaker. Segment order within a speaker
    /// follows the diarizer; speakers are ordered by id.
    pub fn from_diarization(segments: &[DiarizedSegment], config: SpeechConfig) -> Self {
        let mut speaker_map: BTreeMap<SpeakerId, Vec<SpeakerSegment>> = BTreeMap::new();

        for segment in segments {
            if segment.end < segment.start {
                warn!(
                    "Speaker {} segment ends before it starts ({:.3}s > {:.3}s), clamping",
                    segment.speaker_id, segment.start, segment.end
                );
            }
            speaker_map
                .entry(segment.speaker_id)
                .or_default()
                .push(SpeakerSegment::new(segment.start, segment.end));
        }

        let profiles: Vec<SpeakerProfile> = speaker_map
            .into_iter()
            .map(|(speaker_id, segments)| SpeakerProfile::new(speaker_id, segments))
            .collect();

        info!(
            "Built {} speaker profile(s) from {} diarized segment(s)",
            profiles.len(),
            segments.len()
        );

        Self { config, profiles }
    }

    pub fn profiles(&self) -> &[SpeakerProfile] {
        &self.profiles
    }

    pub fn profile(&self, speaker_id: SpeakerId) -> Option<&SpeakerProfile> {
        self.profiles
            .binary_search_by_key(&speaker_id, |p| p.speaker_id)
            .ok()
            .map(|idx| &self.profiles[idx])
    }

    pub fn speaker_ids(&self) -> Vec<SpeakerId> {
        self.profiles.iter().map(|p| p.speaker_id).collect()
    }

    /// Bind an utterance to the speaker whose segments overlap it most.
    ///
    /// Utterances shorter than `min_match_secs`, or with no overlapping
    /// speaker, are not matched. On equal overlap the lower speaker id wins.
    pub fn match_utterance(&self, utterance: &Utterance) -> Option<MatchedUtterance> {
        if utterance.duration() < self.config.min_match_secs {
            return None;
        }

        let mut best: Option<(SpeakerId, f64)> = None;
        for profile in &self.profiles {
            let total_overlap = profile.overlap(utterance.start_time, utterance.end_time);
            if total_overlap > best.map(|(_, o)| o).unwrap_or(0.0) {
                best = Some((profile.speaker_id, total_overlap));
            }
        }

        best.map(|(speaker_id, overlap_secs)| MatchedUtterance {
            utterance: utterance.clone(),
            speaker_id,
            overlap_secs,
        })
    }

    pub fn match_utterances(&self, utterances: &[Utterance]) -> Vec<MatchedUtterance> {
        let matched: Vec<MatchedUtterance> = utterances
            .iter()
            .filter_map(|u| {
                let result = self.match_utterance(u);
                if result.is_none() {
                    debug!(
                        "Utterance [{:.2}s-{:.2}s] not matched to any speaker",
                        u.start_time, u.end_time
                    );
                }
                result
            })
            .collect();

        info!(
            "Matched {}/{} utterance(s) to speakers",
            matched.len(),
            utterances.len()
        );
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(speaker_id: SpeakerId, start: f64, end: f64) -> DiarizedSegment {
        DiarizedSegment { speaker_id, start, end }
    }

    fn store(segments: &[DiarizedSegment]) -> SpeakerSegmentStore {
        SpeakerSegmentStore::from_diarization(segments, SpeechConfig::default())
    }

    #[test]
    fn test_groups_segments_by_speaker() {
        let store = store(&[seg(1, 5.0, 6.0), seg(0, 0.0, 2.0), seg(1, 8.0, 9.0), seg(0, 3.0, 4.0)]);

        assert_eq!(store.speaker_ids(), vec![0, 1]);
        let speaker1 = store.profile(1).unwrap();
        assert_eq!(speaker1.segments.len(), 2);
        assert_eq!(speaker1.segments[0].start_time, 5.0);
        assert!(store.profile(7).is_none());
    }

    #[test]
    fn test_match_by_total_overlap() {
        // Speaker 1 has two short pieces that together beat speaker 0's single piece
        let store = store(&[
            seg(0, 0.0, 1.2),
            seg(1, 1.2, 2.0),
            seg(1, 2.2, 3.0),
        ]);
        let utterance = Utterance::new("hello", 0.5, 3.0);

        let matched = store.match_utterance(&utterance).unwrap();
        assert_eq!(matched.speaker_id, 1);
        assert!((matched.overlap_secs - 1.6).abs() < 1e-9);
    }

    #[test]
    fn test_short_utterance_is_dropped() {
        let store = store(&[seg(0, 0.0, 10.0)]);
        assert!(store.match_utterance(&Utterance::new("hi", 1.0, 1.4)).is_none());
        assert!(store.match_utterance(&Utterance::new("hi there", 1.0, 1.5)).is_some());
    }

    #[test]
    fn test_no_overlap_is_dropped() {
        let store = store(&[seg(0, 0.0, 1.0)]);
        assert!(store.match_utterance(&Utterance::new("late", 2.0, 3.0)).is_none());
    }

    #[test]
    fn test_equal_overlap_prefers_lower_id() {
        let store = store(&[seg(2, 0.0, 1.0), seg(1, 1.0, 2.0)]);
        let matched = store.match_utterance(&Utterance::new("split", 0.5, 1.5)).unwrap();
        assert_eq!(matched.speaker_id, 1);
    }

    #[test]
    fn test_match_utterances_filters() {
        let store = store(&[seg(0, 0.0, 5.0), seg(1, 5.0, 10.0)]);
        let utterances = vec![
            Utterance::new("first", 0.5, 4.5),
            Utterance::new("blip", 4.9, 5.1),
            Utterance::new("second", 5.5, 9.5),
        ];

        let matched = store.match_utterances(&utterances);
        assert_eq!(matched.len(), 2);
        assert_eq!(matched[0].speaker_id, 0);
        assert_eq!(matched[1].speaker_id, 1);
    }
}
