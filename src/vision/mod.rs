// vision/mod.rs
//
// Face side of the fusion: detections, lip-derived mouth openness and the
// face-tracking pass that turns sampled frames into face profiles.
//
// Module structure:
// - types.rs: FaceObservation, FaceSample, FaceProfile
// - landmarks.rs: Mouth openness from lip contours
// - tracker.rs: FaceTracker (spatial/temporal track association)
// - preview.rs: Advisory live-playback overlay classifier

pub mod types;
pub mod landmarks;
pub mod tracker;
pub mod preview;

pub use types::{FaceObservation, FaceProfile, FaceSample, FaceSummary, TrackId};
pub use tracker::{sampling_interval, FaceTracker};
pub use preview::{FaceBox, PreviewClassifier};
