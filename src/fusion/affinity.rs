//! Face/speaker affinity scoring
//!
//! Two levels of evidence link a face to a speaker:
//! - segment affinity (coarse): speaking samples of a face that fall inside a
//!   speaker's segments, weighted by closeness to the segment midpoint
//! - sample score (fine): one detection at one instant against one face
//!   profile, in the context of one candidate speaker
//!
//! Everything here is a pure function of its inputs. The per-pair parts that
//! do not depend on the detection (segment affinity, spatial consistency) are
//! computed once into dense `faces x speakers` matrices.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::config::ScoringConfig;
use crate::geometry::{NormalizedRect, Point};
use crate::perf_trace;
use crate::speech::{SpeakerId, SpeakerProfile, SpeakerSegment};
use crate::vision::{FaceProfile, TrackId};

/// Triangular weight of a sample inside a segment: 1 at the midpoint, 0 at the edges
pub fn triangular_weight(time: f64, segment: &SpeakerSegment) -> f64 {
    let duration = segment.duration();
    if duration <= 0.0 {
        return 0.0;
    }
    1.0 - ((time - segment.midpoint()).abs() / duration).min(1.0)
}

/// Mouth-openness evidence of `face` speaking during `segment`
pub fn segment_face_affinity(segment: &SpeakerSegment, face: &FaceProfile) -> f64 {
    face.samples_between(segment.start_time, segment.end_time)
        .filter(|s| s.is_speaking)
        .map(|s| s.mouth_openness * triangular_weight(s.timestamp, segment))
        .sum()
}

/// How steady the face is while the speaker talks.
///
/// Each segment is sampled at `points_per_segment` evenly spaced instants; the
/// face sample nearest each instant contributes its center and timestamp. The
/// result is `1 / (1 + pw * position_variance + tw * time_variance)` in [0,1],
/// or 1.0 when fewer than two samples are available.
pub fn spatial_consistency(
    face: &FaceProfile,
    speaker: &SpeakerProfile,
    config: &ScoringConfig,
) -> f64 {
    let mut positions: Vec<Point> = Vec::new();
    let mut timestamps: Vec<f64> = Vec::new();

    let points = config.spatial_points_per_segment.max(2);
    for segment in &speaker.segments {
        let duration = segment.duration();
        let instants = if duration > 0.0 { points } else { 1 };
        let step = duration / (points - 1) as f64;

        for i in 0..instants {
            let instant = segment.start_time + i as f64 * step;
            if let Some(closest) = face.closest_sample(instant) {
                positions.push(closest.center());
                timestamps.push(closest.timestamp);
            }
        }
    }

    if positions.len() < 2 {
        return 1.0;
    }

    let n = positions.len() as f64;
    let mean_x = positions.iter().map(|p| p.x).sum::<f64>() / n;
    let mean_y = positions.iter().map(|p| p.y).sum::<f64>() / n;
    let position_variance = positions
        .iter()
        .map(|p| (p.x - mean_x).powi(2) + (p.y - mean_y).powi(2))
        .sum::<f64>()
        / n;

    let mean_t = timestamps.iter().sum::<f64>() / n;
    let time_variance = timestamps.iter().map(|t| (t - mean_t).powi(2)).sum::<f64>() / n;

    let combined = 1.0
        / (1.0
            + config.spatial_position_weight * position_variance
            + config.spatial_time_weight * time_variance);
    combined.clamp(0.0, 1.0)
}

/// Dense segment-affinity matrix, rows follow the face order, columns the speaker order
#[derive(Debug, Clone)]
pub struct AffinityTable {
    face_ids: Vec<TrackId>,
    scores: Array2<f64>,
}

impl AffinityTable {
    pub fn compute(faces: &[FaceProfile], speakers: &[SpeakerProfile]) -> Self {
        let mut scores = Array2::<f64>::zeros((faces.len(), speakers.len()));

        for (s_idx, speaker) in speakers.iter().enumerate() {
            for segment in &speaker.segments {
                for (f_idx, face) in faces.iter().enumerate() {
                    scores[[f_idx, s_idx]] += segment_face_affinity(segment, face);
                }
            }
        }

        Self {
            face_ids: faces.iter().map(|f| f.id).collect(),
            scores,
        }
    }

    /// Affinity by matrix position
    pub fn at(&self, face_idx: usize, speaker_idx: usize) -> f64 {
        self.scores[[face_idx, speaker_idx]]
    }

    /// Face with the highest strictly positive affinity for a speaker column.
    /// Ties go to the lowest track id.
    pub fn best_face(&self, speaker_idx: usize) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for (f_idx, &score) in self.scores.column(speaker_idx).iter().enumerate() {
            if score <= 0.0 {
                continue;
            }
            let better = match best {
                None => true,
                Some((b_idx, b_score)) => {
                    score > b_score || (score == b_score && self.face_ids[f_idx] < self.face_ids[b_idx])
                }
            };
            if better {
                best = Some((f_idx, score));
            }
        }
        best
    }

    pub fn shape(&self) -> (usize, usize) {
        self.scores.dim()
    }
}

/// Components of one fine-grained score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleScore {
    pub iou: f64,
    pub temporal: f64,
    pub mouth: f64,
    pub segment_affinity: f64,
    pub spatial_consistency: f64,
    pub total: f64,
}

/// Scores detections against face profiles for candidate speakers
#[derive(Debug)]
pub struct AffinityScorer<'a> {
    config: ScoringConfig,
    faces: &'a [FaceProfile],
    speakers: &'a [SpeakerProfile],
    affinity: AffinityTable,
    spatial: Array2<f64>,
}

impl<'a> AffinityScorer<'a> {
    pub fn new(config: ScoringConfig, faces: &'a [FaceProfile], speakers: &'a [SpeakerProfile]) -> Self {
        let affinity = AffinityTable::compute(faces, speakers);

        let mut spatial = Array2::<f64>::ones((faces.len(), speakers.len()));
        for (f_idx, face) in faces.iter().enumerate() {
            for (s_idx, speaker) in speakers.iter().enumerate() {
                spatial[[f_idx, s_idx]] = spatial_consistency(face, speaker, &config);
            }
        }

        Self {
            config,
            faces,
            speakers,
            affinity,
            spatial,
        }
    }

    pub fn affinity(&self) -> &AffinityTable {
        &self.affinity
    }

    pub fn faces(&self) -> &'a [FaceProfile] {
        self.faces
    }

    pub fn speakers(&self) -> &'a [SpeakerProfile] {
        self.speakers
    }

    pub fn speaker_index(&self, speaker_id: SpeakerId) -> Option<usize> {
        self.speakers.iter().position(|s| s.speaker_id == speaker_id)
    }

    /// Fine score of a detection at `time` against one face for one speaker.
    ///
    /// `None` when the face has no sample within `iou_max_time_delta` of `time`.
    pub fn sample_score(
        &self,
        time: f64,
        detection_box: &NormalizedRect,
        mouth_openness: f64,
        face_idx: usize,
        speaker_idx: usize,
    ) -> Option<SampleScore> {
        let cfg = &self.config;
        let face = &self.faces[face_idx];
        let closest = face.closest_sample(time)?;

        let time_delta = (closest.timestamp - time).abs();
        if time_delta >= cfg.iou_max_time_delta {
            return None;
        }

        let iou = detection_box.iou(&closest.bounding_box);
        let temporal = 1.0 - (time_delta / cfg.iou_max_time_delta).min(1.0);
        let segment_affinity =
            (self.affinity.at(face_idx, speaker_idx) / cfg.segment_affinity_norm).min(1.0);
        let spatial_consistency = self.spatial[[face_idx, speaker_idx]];

        let total = cfg.weight_iou * iou
            + cfg.weight_temporal * temporal
            + cfg.weight_mouth * mouth_openness
            + cfg.weight_segment * segment_affinity
            + cfg.weight_spatial * spatial_consistency;

        Some(SampleScore {
            iou,
            temporal,
            mouth: mouth_openness,
            segment_affinity,
            spatial_consistency,
            total,
        })
    }

    /// Best-scoring face for a detection, or `None` if nothing beats the floor.
    ///
    /// Faces are scanned in profile order and only a strictly higher score
    /// replaces the current best, so the first face wins an exact tie.
    pub fn best_face(
        &self,
        time: f64,
        detection_box: &NormalizedRect,
        mouth_openness: f64,
        speaker_idx: usize,
    ) -> Option<(usize, SampleScore)> {
        let mut best: Option<(usize, SampleScore)> = None;
        let mut best_total = self.config.score_floor;

        for face_idx in 0..self.faces.len() {
            let Some(score) = self.sample_score(time, detection_box, mouth_openness, face_idx, speaker_idx)
            else {
                continue;
            };
            perf_trace!(
                "t={:.3}s face {} speaker {}: iou={:.3} temporal={:.3} mouth={:.3} seg={:.3} spatial={:.3} total={:.3}",
                time,
                self.faces[face_idx].id,
                self.speakers[speaker_idx].speaker_id,
                score.iou,
                score.temporal,
                score.mouth,
                score.segment_affinity,
                score.spatial_consistency,
                score.total
            );
            if score.total > best_total {
                best_total = score.total;
                best = Some((face_idx, score));
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::FaceSample;

    fn face(id: TrackId, x: f64, samples: &[(f64, f64, bool)]) -> FaceProfile {
        let samples = samples
            .iter()
            .map(|&(t, mouth, speaking)| FaceSample {
                timestamp: t,
                bounding_box: NormalizedRect::centered(Point::new(x, 0.5), 0.2, 0.2),
                mouth_openness: mouth,
                is_speaking: speaking,
            })
            .collect();
        FaceProfile::from_samples(id, samples).unwrap()
    }

    fn speaker(id: SpeakerId, segments: &[(f64, f64)]) -> SpeakerProfile {
        SpeakerProfile::new(
            id,
            segments.iter().map(|&(s, e)| SpeakerSegment::new(s, e)).collect(),
        )
    }

    #[test]
    fn test_triangular_weight() {
        let seg = SpeakerSegment::new(0.0, 4.0);
        assert_eq!(triangular_weight(2.0, &seg), 1.0);
        assert_eq!(triangular_weight(1.0, &seg), 0.75);
        assert_eq!(triangular_weight(0.0, &seg), 0.5);
        assert_eq!(triangular_weight(-10.0, &seg), 0.0);
        assert_eq!(triangular_weight(3.0, &SpeakerSegment::new(3.0, 3.0)), 0.0);
    }

    #[test]
    fn test_segment_affinity_counts_only_speaking_samples_inside() {
        let f = face(0, 0.3, &[(1.0, 0.4, true), (2.0, 0.5, false), (2.0001, 0.2, true), (9.0, 1.0, true)]);
        let seg = SpeakerSegment::new(0.0, 4.0);
        let expected = 0.4 * 0.75 + 0.2 * triangular_weight(2.0001, &seg);
        assert!((segment_face_affinity(&seg, &f) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_affinity_table_accumulates_segments() {
        let f0 = face(0, 0.3, &[(1.0, 0.4, true), (6.0, 0.4, true)]);
        let f1 = face(1, 0.7, &[(1.0, 0.1, false)]);
        let s = speaker(4, &[(0.0, 2.0), (5.0, 7.0)]);

        let table = AffinityTable::compute(&[f0, f1], &[s]);
        assert_eq!(table.shape(), (2, 1));
        assert!((table.at(0, 0) - 0.8).abs() < 1e-12);
        assert_eq!(table.at(1, 0), 0.0);
        assert_eq!(table.best_face(0), Some((0, table.at(0, 0))));
    }

    #[test]
    fn test_best_face_requires_positive_affinity() {
        let f0 = face(0, 0.3, &[(1.0, 0.4, false)]);
        let table = AffinityTable::compute(&[f0], &[speaker(0, &[(0.0, 2.0)])]);
        assert!(table.best_face(0).is_none());
    }

    #[test]
    fn test_best_face_tie_prefers_lowest_track_id() {
        let f5 = face(5, 0.2, &[(1.0, 0.4, true)]);
        let f2 = face(2, 0.8, &[(1.0, 0.4, true)]);
        let table = AffinityTable::compute(&[f5, f2], &[speaker(0, &[(0.0, 2.0)])]);
        let (idx, _) = table.best_face(0).unwrap();
        assert_eq!(idx, 1);
    }

    #[test]
    fn test_spatial_consistency() {
        let cfg = ScoringConfig::default();
        // Sample instants land on samples at 0,1,2,3,4 -> time variance 2.0, static position
        let f = face(0, 0.3, &[(0.0, 0.0, false), (1.0, 0.0, false), (2.0, 0.0, false), (3.0, 0.0, false), (4.0, 0.0, false)]);
        let s = speaker(0, &[(0.0, 4.0)]);
        let expected = 1.0 / (1.0 + 0.3 * 2.0);
        assert!((spatial_consistency(&f, &s, &cfg) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_spatial_consistency_lenient_default() {
        let cfg = ScoringConfig::default();
        let f = face(0, 0.3, &[(1.0, 0.0, false)]);
        // A single zero-length segment yields one sample instant
        assert_eq!(spatial_consistency(&f, &speaker(0, &[(1.0, 1.0)]), &cfg), 1.0);
        assert_eq!(spatial_consistency(&f, &speaker(0, &[]), &cfg), 1.0);
    }

    #[test]
    fn test_sample_score_components() {
        let f = face(0, 0.3, &[(1.0, 0.3, true), (1.1, 0.3, true)]);
        let s = speaker(0, &[(0.0, 2.0)]);
        let faces = [f];
        let speakers = [s];
        let scorer = AffinityScorer::new(ScoringConfig::default(), &faces, &speakers);

        let det = NormalizedRect::centered(Point::new(0.3, 0.5), 0.2, 0.2);
        let score = scorer.sample_score(1.0, &det, 0.4, 0, 0).unwrap();

        assert!((score.iou - 1.0).abs() < 1e-9);
        assert_eq!(score.temporal, 1.0);
        assert_eq!(score.mouth, 0.4);
        let affinity = scorer.affinity().at(0, 0);
        assert!((score.segment_affinity - affinity / 100.0).abs() < 1e-12);
        let expected = 0.3 * score.iou + 0.2 + 0.2 * 0.4 + 0.2 * score.segment_affinity + 0.1 * score.spatial_consistency;
        assert!((score.total - expected).abs() < 1e-12);
    }

    #[test]
    fn test_sample_score_time_gate() {
        let faces = [face(0, 0.3, &[(1.0, 0.3, true)])];
        let speakers = [speaker(0, &[(0.0, 2.0)])];
        let scorer = AffinityScorer::new(ScoringConfig::default(), &faces, &speakers);
        let det = NormalizedRect::centered(Point::new(0.3, 0.5), 0.2, 0.2);

        assert!(scorer.sample_score(1.49, &det, 0.4, 0, 0).is_some());
        assert!(scorer.sample_score(1.5, &det, 0.4, 0, 0).is_none());
    }

    #[test]
    fn test_scores_are_deterministic() {
        let faces = [face(0, 0.3, &[(1.0, 0.3, true), (1.5, 0.1, false)]), face(1, 0.6, &[(1.2, 0.2, true)])];
        let speakers = [speaker(0, &[(0.0, 2.0)]), speaker(1, &[(1.0, 3.0)])];
        let det = NormalizedRect::centered(Point::new(0.31, 0.5), 0.2, 0.2);

        let a = AffinityScorer::new(ScoringConfig::default(), &faces, &speakers);
        let b = AffinityScorer::new(ScoringConfig::default(), &faces, &speakers);
        for speaker_idx in 0..2 {
            for face_idx in 0..2 {
                assert_eq!(
                    a.sample_score(1.1, &det, 0.2, face_idx, speaker_idx),
                    b.sample_score(1.1, &det, 0.2, face_idx, speaker_idx)
                );
                assert_eq!(a.affinity().at(face_idx, speaker_idx), b.affinity().at(face_idx, speaker_idx));
            }
        }
    }

    #[test]
    fn test_best_face_floor() {
        let faces = [face(0, 0.3, &[(1.0, 0.0, false)])];
        let speakers = [speaker(0, &[(5.0, 6.0)])];
        let scorer = AffinityScorer::new(ScoringConfig::default(), &faces, &speakers);

        // Disjoint box, closed mouth: only the temporal and spatial terms contribute
        let far = NormalizedRect::centered(Point::new(0.8, 0.5), 0.1, 0.1);
        assert!(scorer.best_face(1.0, &far, 0.0, 0).is_none());

        let near = NormalizedRect::centered(Point::new(0.3, 0.5), 0.2, 0.2);
        let (idx, score) = scorer.best_face(1.0, &near, 0.1, 0).unwrap();
        assert_eq!(idx, 0);
        assert!(score.total > 0.5);
    }
}
