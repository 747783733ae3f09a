// pipeline/mod.rs
//
// Staged fusion driver over the external collaborators.
//
// Module structure:
// - frames.rs: FrameAnalyzer (frame fetch + blocking-pool detection)
// - tracking.rs: Sampling schedule and the face-tracking pass
// - coordinator.rs: FusionCoordinator (audio gate, speech/vision stages, matching)
// - progress.rs: Stage reporting over a watch channel

pub mod frames;
pub mod tracking;
pub mod coordinator;
pub mod progress;

pub use frames::FrameAnalyzer;
pub use tracking::{run_tracking_pass, tracking_schedule};
pub use coordinator::{Collaborators, FusionCoordinator};
pub use progress::{FusionProgress, FusionStage, ProgressReporter};
