// speaker-face-match - Offline speaker/face fusion
//
// Maps diarized speakers to the on-screen faces that voice them:
// - Face tracking over sampled video frames
// - Utterance-to-speaker matching by temporal overlap
// - Affinity scoring, vote aggregation and fallback assignment
// - Playback-time "who is talking" projection

// Performance logging macros - exported for use by other modules
#[macro_use]
pub mod macros;

// Core modules
pub mod config;
pub mod error;
pub mod geometry;
pub mod vision;
pub mod speech;
pub mod fusion;
pub mod collaborators;
pub mod pipeline;
pub mod state;

pub use config::FusionConfig;
pub use error::{CollaboratorError, FusionError};
pub use fusion::{FusionSnapshot, MatchedSpeaker, PlaybackStateTracker};
pub use pipeline::{Collaborators, FusionCoordinator, FusionProgress, FusionStage};
pub use state::FusionState;

/// Initialize env_logger to output to stderr (reads RUST_LOG env var).
/// Call once from the binary; library code never installs a logger.
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}
