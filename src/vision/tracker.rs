//! Face tracker - links per-frame detections into face tracks
//!
//! Detections are associated with active tracks by spatial and temporal
//! continuity: a track is a candidate when the detection center lies within
//! `match_distance` of the track's smoothed center and the track was updated
//! less than `max_idle_secs` ago. The nearest candidate wins (lowest track id
//! on an exact tie); with no candidate a new track is allocated.
//!
//! Track histories live in an arena indexed by `TrackId`. Eviction from the
//! active set only stops a track from growing; its history is kept until
//! `finalize`.

use log::{debug, info, warn};

use crate::config::TrackerConfig;
use crate::geometry::Point;
use crate::{perf_debug, perf_trace};

use super::types::{FaceObservation, FaceProfile, FaceSample, TrackId};

/// Frame stride that spreads roughly `target_samples` samples over the video
pub fn sampling_interval(total_frames: usize, target_samples: usize) -> usize {
    (total_frames / target_samples.max(1)).max(1)
}

/// State of a track that can still be extended
#[derive(Debug, Clone)]
struct ActiveTrack {
    id: TrackId,
    last_time: f64,
    avg_position: Point,
}

/// Sample history and running mouth-openness accumulator of one track
#[derive(Debug, Default)]
struct TrackHistory {
    samples: Vec<FaceSample>,
    mouth_sum: f64,
}

/// Builds face tracks from a time-ordered stream of sampled frames
pub struct FaceTracker {
    config: TrackerConfig,
    active: Vec<ActiveTrack>,
    histories: Vec<TrackHistory>,
    last_frame_time: Option<f64>,
    frames_observed: usize,
}

impl FaceTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            active: Vec::new(),
            histories: Vec::new(),
            last_frame_time: None,
            frames_observed: 0,
        }
    }

    /// Number of tracks allocated so far, finalized or not
    pub fn track_count(&self) -> usize {
        self.histories.len()
    }

    pub fn active_track_count(&self) -> usize {
        self.active.len()
    }

    pub fn frames_observed(&self) -> usize {
        self.frames_observed
    }

    /// Feed every detection of one sampled frame.
    ///
    /// Frames must arrive in increasing time order; an out-of-order frame is
    /// dropped so that every track keeps strictly increasing timestamps.
    pub fn observe_frame(&mut self, timestamp: f64, observations: &[FaceObservation]) {
        if let Some(last) = self.last_frame_time {
            if timestamp <= last {
                warn!(
                    "Dropping out-of-order frame at {:.3}s (last frame {:.3}s)",
                    timestamp, last
                );
                return;
            }
        }
        self.last_frame_time = Some(timestamp);
        self.frames_observed += 1;

        for observation in observations {
            self.observe_face(timestamp, observation);
        }

        let max_idle = self.config.max_idle_secs;
        let before = self.active.len();
        self.active.retain(|track| timestamp - track.last_time <= max_idle);
        if self.active.len() < before {
            perf_debug!(
                "Evicted {} idle track(s) at {:.3}s",
                before - self.active.len(),
                timestamp
            );
        }
    }

    fn observe_face(&mut self, timestamp: f64, observation: &FaceObservation) {
        let bounding_box = observation.bounding_box;
        let center = bounding_box.center();
        let mouth_openness = observation.mouth_openness();

        let track_id = match self.find_candidate(center, timestamp) {
            Some(idx) => {
                let keep = self.config.smoothing_keep;
                let new = self.config.smoothing_new;
                let track = &mut self.active[idx];
                track.avg_position = Point::new(
                    track.avg_position.x * keep + center.x * new,
                    track.avg_position.y * keep + center.y * new,
                );
                track.last_time = timestamp;
                track.id
            }
            None => {
                let id = self.histories.len();
                self.histories.push(TrackHistory::default());
                self.active.push(ActiveTrack {
                    id,
                    last_time: timestamp,
                    avg_position: center,
                });
                perf_debug!(
                    "New face track {} at ({:.3}, {:.3}) t={:.3}s",
                    id, center.x, center.y, timestamp
                );
                id
            }
        };

        let history = &mut self.histories[track_id];
        history.mouth_sum += mouth_openness;
        // The running average includes the sample being classified
        let avg = history.mouth_sum / (history.samples.len() + 1) as f64;
        let threshold = self.config.speaking_floor.max(avg * self.config.speaking_ratio);
        let is_speaking = mouth_openness > threshold;

        history.samples.push(FaceSample {
            timestamp,
            bounding_box,
            mouth_openness,
            is_speaking,
        });

        perf_trace!(
            "Track {} t={:.3}s mouth={:.4} avg={:.4} speaking={}",
            track_id,
            timestamp,
            mouth_openness,
            avg,
            is_speaking
        );
    }

    /// Index into `active` of the nearest qualifying track
    fn find_candidate(&self, center: Point, timestamp: f64) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;

        for (idx, track) in self.active.iter().enumerate() {
            // Already extended in this frame
            if track.last_time >= timestamp {
                continue;
            }
            if timestamp - track.last_time >= self.config.max_idle_secs {
                continue;
            }
            let distance = center.distance(&track.avg_position);
            if distance >= self.config.match_distance {
                continue;
            }

            let better = match best {
                None => true,
                Some((best_idx, best_distance)) => {
                    distance < best_distance
                        || (distance == best_distance && track.id < self.active[best_idx].id)
                }
            };
            if better {
                best = Some((idx, distance));
            }
        }

        best.map(|(idx, _)| idx)
    }

    /// Turn every sufficiently long track into a profile, ordered by mean x
    pub fn finalize(self) -> Vec<FaceProfile> {
        let total = self.histories.len();
        let min_samples = self.config.min_track_samples;

        let mut profiles: Vec<FaceProfile> = self
            .histories
            .into_iter()
            .enumerate()
            .filter(|(id, history)| {
                if history.samples.len() < min_samples {
                    debug!(
                        "Discarding face track {} with {} sample(s)",
                        id,
                        history.samples.len()
                    );
                    return false;
                }
                true
            })
            .filter_map(|(id, history)| FaceProfile::from_samples(id, history.samples))
            .collect();

        profiles.sort_by(|a, b| {
            a.mean_position
                .x
                .total_cmp(&b.mean_position.x)
                .then(a.id.cmp(&b.id))
        });

        info!(
            "Face tracking finalized: {} profile(s) from {} track(s) over {} frame(s)",
            profiles.len(),
            total,
            self.frames_observed
        );

        profiles
    }
}
