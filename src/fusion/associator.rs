// fusion/associator.rs
//
// Speaker-to-face resolution. Utterances are sampled at a fixed step, every
// detection at a sample instant votes for its best-scoring face on behalf of
// the utterance's speaker, and each speaker takes the face with the largest
// vote total. Speakers without votes fall back to segment affinity.

use std::collections::BTreeMap;

use log::{debug, info};

use crate::config::{AssociationConfig, ScoringConfig};
use crate::perf_debug;
use crate::speech::{MatchedUtterance, SpeakerId, SpeakerProfile, Utterance};
use crate::vision::{FaceObservation, FaceProfile, TrackId};

use super::affinity::AffinityScorer;
use super::result::{AssignmentSource, MatchedSpeaker};

/// Instants at which an utterance is sampled for faces.
///
/// Utterances shorter than `min_utterance_secs` are not sampled. Otherwise the
/// interval is split into `floor(duration / step)` equal steps, at least one.
pub fn utterance_sample_times(utterance: &Utterance, config: &AssociationConfig) -> Vec<f64> {
    let duration = utterance.duration();
    if duration < config.min_utterance_secs {
        return Vec::new();
    }

    let count = ((duration / config.sample_step_secs) as usize).max(1);
    let step = duration / count as f64;
    (0..count)
        .map(|i| utterance.start_time + i as f64 * step)
        .collect()
}

/// One sample of the association pass: which speaker is talking and when
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleRequest {
    pub speaker_id: SpeakerId,
    pub time: f64,
}

/// Votes recorded per speaker, in recording order
#[derive(Debug, Clone, Default)]
pub struct VoteLedger {
    votes: BTreeMap<SpeakerId, Vec<(TrackId, f64)>>,
}

impl VoteLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, speaker_id: SpeakerId, face_id: TrackId, score: f64) {
        self.votes.entry(speaker_id).or_default().push((face_id, score));
    }

    pub fn votes_for(&self, speaker_id: SpeakerId) -> &[(TrackId, f64)] {
        self.votes.get(&speaker_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn total_votes(&self) -> usize {
        self.votes.values().map(Vec::len).sum()
    }

    /// Summed score per face; the face with the largest total wins, lowest id on a tie
    pub fn winner(&self, speaker_id: SpeakerId) -> Option<(TrackId, f64)> {
        let mut totals: BTreeMap<TrackId, f64> = BTreeMap::new();
        for &(face_id, score) in self.votes_for(speaker_id) {
            *totals.entry(face_id).or_insert(0.0) += score;
        }

        let mut best: Option<(TrackId, f64)> = None;
        for (face_id, total) in totals {
            if best.map_or(true, |(_, b)| total > b) {
                best = Some((face_id, total));
            }
        }
        best
    }
}

/// Resolves one face per diarized speaker
pub struct SpeakerFaceAssociator<'a> {
    config: AssociationConfig,
    scorer: AffinityScorer<'a>,
}

impl<'a> SpeakerFaceAssociator<'a> {
    pub fn new(
        association: AssociationConfig,
        scoring: ScoringConfig,
        faces: &'a [FaceProfile],
        speakers: &'a [SpeakerProfile],
    ) -> Self {
        Self {
            config: association,
            scorer: AffinityScorer::new(scoring, faces, speakers),
        }
    }

    /// Sample instants for every matched utterance, in utterance order
    pub fn sample_plan(&self, utterances: &[MatchedUtterance]) -> Vec<SampleRequest> {
        let plan: Vec<SampleRequest> = utterances
            .iter()
            .flat_map(|m| {
                utterance_sample_times(&m.utterance, &self.config)
                    .into_iter()
                    .map(move |time| SampleRequest {
                        speaker_id: m.speaker_id,
                        time,
                    })
            })
            .collect();

        debug!(
            "Association plan: {} sample(s) over {} utterance(s)",
            plan.len(),
            utterances.len()
        );
        plan
    }

    /// Score the detections found at one sample instant and record a vote per detection
    /// that clears the floor. Returns the number of votes recorded.
    pub fn record_detections(
        &self,
        request: SampleRequest,
        detections: &[FaceObservation],
        ledger: &mut VoteLedger,
    ) -> usize {
        let Some(speaker_idx) = self.scorer.speaker_index(request.speaker_id) else {
            debug!("Speaker {} has no profile, skipping sample", request.speaker_id);
            return 0;
        };

        let mut recorded = 0;
        for detection in detections {
            let mouth = detection.mouth_openness();
            if mouth <= self.config.min_mouth_openness {
                continue;
            }

            if let Some((face_idx, score)) =
                self.scorer
                    .best_face(request.time, &detection.bounding_box, mouth, speaker_idx)
            {
                let face_id = self.scorer.faces()[face_idx].id;
                perf_debug!(
                    "Vote at {:.2}s: speaker {} -> face {} ({:.3})",
                    request.time,
                    request.speaker_id,
                    face_id,
                    score.total
                );
                ledger.record(request.speaker_id, face_id, score.total);
                recorded += 1;
            }
        }
        recorded
    }

    /// Final assignment for every speaker, ordered by speaker id
    pub fn resolve(&self, ledger: &VoteLedger) -> Vec<MatchedSpeaker> {
        let faces = self.scorer.faces();
        let mut resolved = Vec::with_capacity(self.scorer.speakers().len());

        for (speaker_idx, speaker) in self.scorer.speakers().iter().enumerate() {
            let (face_idx, source) = match ledger.winner(speaker.speaker_id) {
                Some((face_id, total)) => {
                    debug!(
                        "Speaker {} -> face {} by {} vote(s), total {:.3}",
                        speaker.speaker_id,
                        face_id,
                        ledger.votes_for(speaker.speaker_id).len(),
                        total
                    );
                    (faces.iter().position(|f| f.id == face_id), AssignmentSource::Votes)
                }
                None => match self.scorer.affinity().best_face(speaker_idx) {
                    Some((face_idx, affinity)) => {
                        debug!(
                            "Speaker {} -> face {} by segment affinity {:.3}",
                            speaker.speaker_id, faces[face_idx].id, affinity
                        );
                        (Some(face_idx), AssignmentSource::Affinity)
                    }
                    None => {
                        debug!("Speaker {} left unmatched", speaker.speaker_id);
                        (None, AssignmentSource::Unmatched)
                    }
                },
            };

            let face = face_idx.map(|idx| &faces[idx]);
            resolved.push(MatchedSpeaker {
                speaker_id: speaker.speaker_id,
                face_id: face.map(|f| f.id),
                position: face.map(|f| f.mean_position),
                segments: speaker.segments.clone(),
                source,
                is_currently_speaking: false,
            });
        }

        resolved.sort_by_key(|s| s.speaker_id);

        let matched = resolved.iter().filter(|s| s.face_id.is_some()).count();
        info!(
            "Resolved {}/{} speaker(s) to faces from {} vote(s)",
            matched,
            resolved.len(),
            ledger.total_votes()
        );
        resolved
    }

    /// Run the whole pass against a synchronous detection lookup
    pub fn associate<F>(&self, utterances: &[MatchedUtterance], mut detect_at: F) -> Vec<MatchedSpeaker>
    where
        F: FnMut(f64) -> Vec<FaceObservation>,
    {
        let mut ledger = VoteLedger::new();
        for request in self.sample_plan(utterances) {
            let detections = detect_at(request.time);
            self.record_detections(request, &detections, &mut ledger);
        }
        self.resolve(&ledger)
    }
}
