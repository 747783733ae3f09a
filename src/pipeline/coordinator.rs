// pipeline/coordinator.rs
//
// Staged driver of a fusion run:
//
//                  ┌─> recognize -> diarize ─┐
//   audio ready ───┤                         ├─> match utterances -> associate -> publish
//                  └─> face-tracking pass ───┘
//
// Nothing starts before the audio gate opens. After it, the speech branch and
// the tracking pass run concurrently. Collaborator failures degrade a stage
// to an empty result; only missing audio is fatal.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::sync::watch;

use crate::collaborators::{
    AudioSource, AudioStatus, Diarizer, FaceLandmarkDetector, FrameSource, SessionRecording,
    SpeechRecognizer,
};
use crate::collaborators::recorded::RecordedDetector;
use crate::config::FusionConfig;
use crate::error::FusionError;
use crate::fusion::{FusionSnapshot, MatchedSpeaker, SpeakerFaceAssociator, VoteLedger};
use crate::speech::{DiarizedSegment, MatchedUtterance, SpeakerSegmentStore, Utterance};
use crate::state::FusionState;
use crate::vision::FaceProfile;

use super::frames::FrameAnalyzer;
use super::progress::{FusionProgress, FusionStage, ProgressReporter};
use super::tracking::run_tracking_pass;

/// The external services a run talks to
#[derive(Clone)]
pub struct Collaborators {
    pub audio: Arc<dyn AudioSource>,
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub diarizer: Arc<dyn Diarizer>,
    pub frames: Arc<dyn FrameSource>,
    pub detector: Arc<dyn FaceLandmarkDetector>,
}

impl Collaborators {
    /// Every collaborator replayed from one recorded session
    pub fn from_recording(session: Arc<SessionRecording>) -> Self {
        Self {
            audio: session.clone(),
            recognizer: session.clone(),
            diarizer: session.clone(),
            frames: session,
            detector: Arc::new(RecordedDetector),
        }
    }
}

/// Output of the speech branch
#[derive(Debug, Default)]
struct SpeechOutput {
    utterances: Vec<Utterance>,
    segments: Vec<DiarizedSegment>,
}

pub struct FusionCoordinator {
    config: FusionConfig,
    audio: Arc<dyn AudioSource>,
    recognizer: Arc<dyn SpeechRecognizer>,
    diarizer: Arc<dyn Diarizer>,
    analyzer: FrameAnalyzer,
    state: Arc<FusionState>,
    progress: ProgressReporter,
}

impl FusionCoordinator {
    pub fn new(config: FusionConfig, collaborators: Collaborators, state: Arc<FusionState>) -> Self {
        let (progress, _) = ProgressReporter::new();
        Self {
            config,
            audio: collaborators.audio,
            recognizer: collaborators.recognizer,
            diarizer: collaborators.diarizer,
            analyzer: FrameAnalyzer::new(collaborators.frames, collaborators.detector),
            state,
            progress,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<FusionProgress> {
        self.progress.subscribe()
    }

    pub fn state(&self) -> &Arc<FusionState> {
        &self.state
    }

    /// Run every stage and publish the result
    pub async fn run(&self) -> Result<Arc<FusionSnapshot>, FusionError> {
        if self.state.is_complete() {
            return Err(FusionError::AlreadyPublished);
        }
        info!("🚀 Starting speaker/face fusion");

        let audio_path = match self.wait_for_audio().await {
            Ok(path) => path,
            Err(e) => {
                error!("Fusion aborted: {}", e);
                self.progress.report(FusionStage::Failed, e.to_string());
                return Err(e);
            }
        };

        // Tracking runs alongside the speech stages but only the speech branch
        // reports progress, so stages are always seen in pipeline order
        let speech = async {
            let output = self.run_speech_stage(&audio_path).await;
            self.progress.report(FusionStage::TrackingFaces, "Tracking faces");
            output
        };
        let vision = run_tracking_pass(&self.analyzer, &self.config.tracker);
        let (speech, faces) = tokio::join!(speech, vision);

        self.progress.report(FusionStage::Matching, "Matching speakers to faces");
        let store = SpeakerSegmentStore::from_diarization(&speech.segments, self.config.speech.clone());
        let matched = store.match_utterances(&speech.utterances);
        let speakers = self.associate(&faces, &store, &matched).await;

        let snapshot = FusionSnapshot::new(
            faces.iter().map(FaceProfile::summary).collect(),
            speakers,
            matched.len(),
        );

        match self.state.publish(snapshot) {
            Ok(published) => {
                self.progress.report(
                    FusionStage::Complete,
                    format!(
                        "Matched {}/{} speaker(s)",
                        published.matched_count(),
                        published.speakers.len()
                    ),
                );
                Ok(published)
            }
            Err(e) => {
                self.progress.report(FusionStage::Failed, e.to_string());
                Err(e)
            }
        }
    }

    /// Poll the audio source until the converted waveform is ready
    async fn wait_for_audio(&self) -> Result<PathBuf, FusionError> {
        self.progress.report(FusionStage::WaitingForAudio, "Waiting for audio");
        let interval = Duration::from_millis(self.config.pipeline.audio_poll_interval_ms);

        loop {
            match self.audio.status().await {
                AudioStatus::Ready(path) => {
                    info!("Audio ready at {:?}", path);
                    return Ok(path);
                }
                AudioStatus::Failed(reason) => {
                    return Err(FusionError::AudioUnavailable(reason));
                }
                AudioStatus::Pending => tokio::time::sleep(interval).await,
            }
        }
    }

    async fn run_speech_stage(&self, audio_path: &Path) -> SpeechOutput {
        self.progress.report(FusionStage::Recognizing, "Recognizing speech");
        let utterances = match self.recognizer.recognize(audio_path).await {
            Ok(utterances) => {
                info!("Recognized {} utterance(s)", utterances.len());
                utterances
            }
            Err(e) => {
                warn!("Speech recognition failed, continuing without utterances: {}", e);
                Vec::new()
            }
        };

        self.progress.report(FusionStage::Diarizing, "Diarizing speakers");
        let segments = match self
            .diarizer
            .diarize(audio_path, self.config.speech.speaker_count_hint)
            .await
        {
            Ok(segments) => {
                info!("Diarization produced {} segment(s)", segments.len());
                segments
            }
            Err(e) => {
                warn!("Diarization failed, continuing without speakers: {}", e);
                Vec::new()
            }
        };

        SpeechOutput { utterances, segments }
    }

    async fn associate(
        &self,
        faces: &[FaceProfile],
        store: &SpeakerSegmentStore,
        matched: &[MatchedUtterance],
    ) -> Vec<MatchedSpeaker> {
        let associator = SpeakerFaceAssociator::new(
            self.config.association.clone(),
            self.config.scoring.clone(),
            faces,
            store.profiles(),
        );

        let mut ledger = VoteLedger::new();
        for request in associator.sample_plan(matched) {
            let detections = self.analyzer.observe(request.time).await;
            associator.record_detections(request, &detections, &mut ledger);
        }

        associator.resolve(&ledger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::recorded::{RecordedFrame, RecordedVideo};
    use crate::fusion::AssignmentSource;
    use crate::geometry::{NormalizedRect, Point};
    use crate::vision::landmarks::lips_with_span;
    use crate::vision::FaceObservation;
    use crate::collaborators::VideoFrame;
    use crate::error::CollaboratorError;
    use async_trait::async_trait;
    use once_cell::sync::OnceCell;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn observation(x: f64, mouth: f64) -> FaceObservation {
        let (inner, outer) = lips_with_span(mouth / 0.2);
        FaceObservation::new(NormalizedRect::centered(Point::new(x, 0.5), 0.2, 0.2))
            .with_lips(inner, outer)
    }

    /// Ten seconds, two faces; the left one talks first, the right one second.
    /// A talking mouth alternates between open and nearly closed frames.
    fn two_speaker_session() -> SessionRecording {
        let talking = |i: usize| if i % 2 == 0 { 0.35 } else { 0.02 };
        let frames = (0..100)
            .map(|i| {
                let t = i as f64 * 0.1;
                let (left, right) = if t < 5.0 { (talking(i), 0.01) } else { (0.01, talking(i)) };
                RecordedFrame {
                    timestamp: t,
                    observations: vec![observation(0.3, left), observation(0.7, right)],
                }
            })
            .collect();

        SessionRecording {
            audio_path: Some(PathBuf::from("/tmp/session.wav")),
            utterances: Some(vec![
                Utterance::new("hello there", 0.5, 4.5),
                Utterance::new("hi back", 5.5, 9.5),
            ]),
            segments: Some(vec![
                DiarizedSegment { speaker_id: 0, start: 0.0, end: 5.0 },
                DiarizedSegment { speaker_id: 1, start: 5.0, end: 10.0 },
            ]),
            video: RecordedVideo {
                duration_secs: 10.0,
                frame_rate: Some(10.0),
                width: 640,
                height: 480,
                frames,
            },
        }
        .normalized()
        .unwrap()
    }

    fn coordinator(session: SessionRecording) -> FusionCoordinator {
        FusionCoordinator::new(
            FusionConfig::default(),
            Collaborators::from_recording(Arc::new(session)),
            Arc::new(FusionState::new()),
        )
    }

    #[tokio::test]
    async fn test_end_to_end_assignment() {
        let coordinator = coordinator(two_speaker_session());
        let progress = coordinator.subscribe();

        let snapshot = coordinator.run().await.unwrap();

        assert_eq!(snapshot.faces.len(), 2);
        assert_eq!(snapshot.utterances_matched, 2);
        assert_eq!(snapshot.speakers.len(), 2);

        let left = snapshot.faces.iter().find(|f| f.mean_position.x < 0.5).unwrap().id;
        let right = snapshot.faces.iter().find(|f| f.mean_position.x > 0.5).unwrap().id;
        assert_eq!(snapshot.speakers[0].face_id, Some(left));
        assert_eq!(snapshot.speakers[1].face_id, Some(right));
        assert_eq!(snapshot.speakers[0].source, AssignmentSource::Votes);

        assert!(coordinator.state().is_complete());
        assert_eq!(progress.borrow().stage, FusionStage::Complete);

        let active = coordinator.state().speakers_at(7.0);
        assert!(!active[0].is_currently_speaking);
        assert!(active[1].is_currently_speaking);
    }

    /// Replays recorded detections and counts how many frames were analyzed
    #[derive(Default)]
    struct CountingDetector {
        calls: AtomicUsize,
    }

    impl FaceLandmarkDetector for CountingDetector {
        fn detect(&self, frame: &VideoFrame) -> Result<Vec<FaceObservation>, CollaboratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            RecordedDetector.detect(frame)
        }
    }

    fn counted_coordinator(
        session: SessionRecording,
        audio: Option<Arc<dyn AudioSource>>,
    ) -> (FusionCoordinator, Arc<CountingDetector>) {
        let session = Arc::new(session);
        let detector = Arc::new(CountingDetector::default());
        let base = Collaborators::from_recording(session);
        let collaborators = Collaborators {
            audio: audio.unwrap_or(base.audio.clone()),
            detector: detector.clone(),
            ..base
        };
        let mut config = FusionConfig::default();
        config.pipeline.audio_poll_interval_ms = 1;

        let coordinator = FusionCoordinator::new(config, collaborators, Arc::new(FusionState::new()));
        (coordinator, detector)
    }

    /// Pending for a few polls, then gives up
    struct VanishingAudio {
        polls: AtomicUsize,
    }

    #[async_trait]
    impl AudioSource for VanishingAudio {
        async fn status(&self) -> AudioStatus {
            if self.polls.fetch_add(1, Ordering::SeqCst) < 3 {
                AudioStatus::Pending
            } else {
                AudioStatus::Failed("conversion failed".to_string())
            }
        }
    }

    #[tokio::test]
    async fn test_missing_audio_is_fatal() {
        let mut session = two_speaker_session();
        session.audio_path = None;
        let (coordinator, detector) = counted_coordinator(session, None);

        let result = coordinator.run().await;
        assert!(matches!(result, Err(FusionError::AudioUnavailable(_))));
        assert!(!coordinator.state().is_complete());
        assert_eq!(coordinator.subscribe().borrow().stage, FusionStage::Failed);
        assert_eq!(detector.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_frames_analyzed_while_audio_pending() {
        let audio = Arc::new(VanishingAudio { polls: AtomicUsize::new(0) });
        let (coordinator, detector) = counted_coordinator(two_speaker_session(), Some(audio.clone()));

        assert!(matches!(coordinator.run().await, Err(FusionError::AudioUnavailable(_))));
        assert_eq!(audio.polls.load(Ordering::SeqCst), 4);
        assert_eq!(detector.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_recognizer_failure_falls_back_to_affinity() {
        let mut session = two_speaker_session();
        session.utterances = None;
        let coordinator = coordinator(session);

        let snapshot = coordinator.run().await.unwrap();
        assert_eq!(snapshot.utterances_matched, 0);
        assert!(snapshot
            .speakers
            .iter()
            .all(|s| s.source == AssignmentSource::Affinity));
        assert_ne!(snapshot.speakers[0].face_id, snapshot.speakers[1].face_id);
    }

    #[tokio::test]
    async fn test_diarization_failure_publishes_no_speakers() {
        let mut session = two_speaker_session();
        session.segments = None;
        let coordinator = coordinator(session);

        let snapshot = coordinator.run().await.unwrap();
        assert!(snapshot.speakers.is_empty());
        assert_eq!(snapshot.faces.len(), 2);
    }

    #[tokio::test]
    async fn test_second_run_is_rejected() {
        let (coordinator, detector) = counted_coordinator(two_speaker_session(), None);
        let first = coordinator.run().await.unwrap();
        let analyzed = detector.calls.load(Ordering::SeqCst);
        assert!(analyzed > 0);

        assert!(matches!(coordinator.run().await, Err(FusionError::AlreadyPublished)));
        assert_eq!(detector.calls.load(Ordering::SeqCst), analyzed);
        assert!(Arc::ptr_eq(&first, &coordinator.state().snapshot().unwrap()));
        assert_eq!(coordinator.subscribe().borrow().stage, FusionStage::Complete);
    }

    /// Speech collaborators that note the reported stage each time they are called
    struct StageRecorder {
        inner: Arc<SessionRecording>,
        progress: OnceCell<watch::Receiver<FusionProgress>>,
        seen: Mutex<Vec<FusionStage>>,
    }

    impl StageRecorder {
        fn note(&self) {
            if let Some(rx) = self.progress.get() {
                self.seen.lock().unwrap().push(rx.borrow().stage);
            }
        }
    }

    #[async_trait]
    impl SpeechRecognizer for StageRecorder {
        async fn recognize(&self, audio_path: &Path) -> Result<Vec<Utterance>, CollaboratorError> {
            self.note();
            self.inner.recognize(audio_path).await
        }
    }

    #[async_trait]
    impl Diarizer for StageRecorder {
        async fn diarize(
            &self,
            audio_path: &Path,
            speaker_count_hint: usize,
        ) -> Result<Vec<DiarizedSegment>, CollaboratorError> {
            self.note();
            self.inner.diarize(audio_path, speaker_count_hint).await
        }
    }

    #[tokio::test]
    async fn test_stages_reported_in_pipeline_order() {
        let session = Arc::new(two_speaker_session());
        let recorder = Arc::new(StageRecorder {
            inner: session.clone(),
            progress: OnceCell::new(),
            seen: Mutex::new(Vec::new()),
        });
        let collaborators = Collaborators {
            recognizer: recorder.clone(),
            diarizer: recorder.clone(),
            ..Collaborators::from_recording(session)
        };
        let coordinator =
            FusionCoordinator::new(FusionConfig::default(), collaborators, Arc::new(FusionState::new()));
        recorder.progress.set(coordinator.subscribe()).unwrap();

        coordinator.run().await.unwrap();
        assert_eq!(
            *recorder.seen.lock().unwrap(),
            vec![FusionStage::Recognizing, FusionStage::Diarizing]
        );
        assert_eq!(coordinator.subscribe().borrow().stage, FusionStage::Complete);
    }

    /// Reports pending a few times before the audio becomes ready
    struct SlowAudio {
        polls: AtomicUsize,
    }

    #[async_trait]
    impl AudioSource for SlowAudio {
        async fn status(&self) -> AudioStatus {
            if self.polls.fetch_add(1, Ordering::SeqCst) < 3 {
                AudioStatus::Pending
            } else {
                AudioStatus::Ready(PathBuf::from("/tmp/late.wav"))
            }
        }
    }

    #[tokio::test]
    async fn test_polls_until_audio_ready() {
        let session = Arc::new(two_speaker_session());
        let audio = Arc::new(SlowAudio { polls: AtomicUsize::new(0) });
        let collaborators = Collaborators {
            audio: audio.clone(),
            ..Collaborators::from_recording(session)
        };
        let mut config = FusionConfig::default();
        config.pipeline.audio_poll_interval_ms = 1;

        let coordinator = FusionCoordinator::new(
            config,
            collaborators,
            Arc::new(FusionState::new()),
        );
        coordinator.run().await.unwrap();
        assert_eq!(audio.polls.load(Ordering::SeqCst), 4);
    }
}
