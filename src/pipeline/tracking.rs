// pipeline/tracking.rs
//
// Face-tracking pass over the whole video.

use log::{info, warn};

use crate::collaborators::VideoInfo;
use crate::config::TrackerConfig;
use crate::vision::{sampling_interval, FaceProfile, FaceTracker};

use super::frames::FrameAnalyzer;

/// Timestamps of the frames sampled by the tracking pass.
///
/// The video's nominal frame count is strided so that about
/// `target_samples` frames are visited, starting at frame 0.
pub fn tracking_schedule(info: &VideoInfo, config: &TrackerConfig) -> Vec<f64> {
    let fps = info
        .frame_rate
        .filter(|fps| *fps > 0.0)
        .unwrap_or(config.default_frame_rate);
    if !(info.duration_secs > 0.0) || fps <= 0.0 {
        return Vec::new();
    }

    let total_frames = (info.duration_secs * fps) as usize;
    let interval = sampling_interval(total_frames, config.target_samples);

    (0..total_frames)
        .step_by(interval)
        .map(|frame_idx| frame_idx as f64 / fps)
        .collect()
}

/// Sample the video, track faces and finalize the profiles
pub async fn run_tracking_pass(analyzer: &FrameAnalyzer, config: &TrackerConfig) -> Vec<FaceProfile> {
    let info = match analyzer.frame_source().video_info().await {
        Ok(info) => info,
        Err(e) => {
            warn!("Video info unavailable, no faces will be tracked: {}", e);
            return Vec::new();
        }
    };

    let schedule = tracking_schedule(&info, config);
    info!(
        "🎬 Tracking faces over {:.1}s of video: {} sampled frame(s)",
        info.duration_secs,
        schedule.len()
    );

    let mut tracker = FaceTracker::new(config.clone());
    for time in schedule {
        let observations = analyzer.observe(time).await;
        tracker.observe_frame(time, &observations);
    }

    tracker.finalize()
}
