// speech/mod.rs
//
// Speech side of the fusion: recognized utterances, diarized speakers and the
// utterance-to-speaker binding.
//
// Module structure:
// - types.rs: Utterance, SpeakerSegment, SpeakerProfile, MatchedUtterance
// - segment_store.rs: SpeakerSegmentStore (profile grouping + overlap matching)

pub mod types;
pub mod segment_store;

pub use types::{
    DiarizedSegment, MatchedUtterance, SpeakerId, SpeakerProfile, SpeakerSegment, Utterance,
};
pub use segment_store::SpeakerSegmentStore;
