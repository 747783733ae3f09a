// State shared between the fusion pass and its readers

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::info;
use once_cell::sync::OnceCell;

use crate::error::FusionError;
use crate::fusion::{apply_speaking_flags, FusionSnapshot, MatchedSpeaker, PlaybackStateTracker};

/// Publish-once holder for the result of a fusion run.
///
/// The fusion pass writes the snapshot exactly once; any number of readers
/// (display ticks, CLI queries) read it without locking.
#[derive(Debug, Default)]
pub struct FusionState {
    snapshot: OnceCell<Arc<FusionSnapshot>>,
    complete: AtomicBool,
}

impl FusionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the run's result. A second publish is rejected and leaves the
    /// first snapshot in place.
    pub fn publish(&self, snapshot: FusionSnapshot) -> Result<Arc<FusionSnapshot>, FusionError> {
        let snapshot = Arc::new(snapshot);
        self.snapshot
            .set(Arc::clone(&snapshot))
            .map_err(|_| FusionError::AlreadyPublished)?;
        self.complete.store(true, Ordering::SeqCst);

        info!(
            "✅ Fusion result published: {}/{} speaker(s) matched (run {})",
            snapshot.matched_count(),
            snapshot.speakers.len(),
            snapshot.run_id
        );
        Ok(snapshot)
    }

    /// The "fusion complete" signal
    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> Option<Arc<FusionSnapshot>> {
        self.snapshot.get().cloned()
    }

    /// Speakers with their speaking flags set for playback time `t`; empty before publication
    pub fn speakers_at(&self, time: f64) -> Vec<MatchedSpeaker> {
        let Some(snapshot) = self.snapshot.get() else {
            return Vec::new();
        };
        let mut speakers = snapshot.speakers.clone();
        apply_speaking_flags(&mut speakers, time);
        speakers
    }

    /// A per-consumer playback tracker over the published snapshot
    pub fn playback_tracker(&self) -> Option<PlaybackStateTracker> {
        self.snapshot().map(PlaybackStateTracker::new)
    }
}
