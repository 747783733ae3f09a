// fusion/mod.rs
//
// Audio-visual fusion: scoring face/speaker pairs, resolving one face per
// speaker and projecting the result onto a playback clock.
//
// Module structure:
// - affinity.rs: Segment affinity, spatial consistency and per-sample scores
// - associator.rs: SpeakerFaceAssociator (sampling, votes, fallback)
// - result.rs: MatchedSpeaker, FusionSnapshot
// - playback.rs: PlaybackStateTracker

pub mod affinity;
pub mod associator;
pub mod result;
pub mod playback;

pub use affinity::{AffinityScorer, AffinityTable, SampleScore};
pub use associator::{utterance_sample_times, SampleRequest, SpeakerFaceAssociator, VoteLedger};
pub use result::{AssignmentSource, FusionSnapshot, MatchedSpeaker};
pub use playback::{active_speaker_ids, apply_speaking_flags, PlaybackStateTracker};
