//! speaker-face-match - run speaker/face fusion on a recorded session.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use serde::Serialize;

use speaker_face_match::collaborators::recorded::RecordedDetector;
use speaker_face_match::collaborators::{FaceLandmarkDetector, FrameSource, SessionRecording};
use speaker_face_match::fusion::{active_speaker_ids, MatchedSpeaker};
use speaker_face_match::speech::SpeakerId;
use speaker_face_match::vision::{FaceBox, PreviewClassifier};
use speaker_face_match::{Collaborators, FusionConfig, FusionCoordinator, FusionSnapshot, FusionState};

/// Map diarized speakers to on-screen faces for a recorded session.
#[derive(Parser, Debug)]
#[command(name = "speaker-face-match")]
#[command(about = "Map diarized speakers to on-screen faces")]
struct Args {
    /// Session recording (JSON)
    #[arg(short, long)]
    session: PathBuf,

    /// Fusion config file (JSON); defaults are used for anything it omits
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Playback time in seconds to report active speakers for (repeatable)
    #[arg(long = "at")]
    at: Vec<f64>,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,
}

#[derive(Serialize)]
struct ActiveAt {
    time: f64,
    speakers: Vec<SpeakerId>,
    current: Option<MatchedSpeaker>,
    /// Live overlay boxes for the frame shown at `time`
    preview: Vec<FaceBox>,
}

#[derive(Serialize)]
struct Report<'a> {
    snapshot: &'a FusionSnapshot,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    queries: Vec<ActiveAt>,
}

#[tokio::main]
async fn main() -> Result<()> {
    speaker_face_match::init_logging();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => FusionConfig::load(path)?,
        None => FusionConfig::default(),
    };
    config.validate()?;

    let session = Arc::new(SessionRecording::load(&args.session)?);
    let classifier = PreviewClassifier::new(&config.preview);
    let state = Arc::new(FusionState::new());
    let coordinator = FusionCoordinator::new(
        config,
        Collaborators::from_recording(session.clone()),
        state.clone(),
    );

    let snapshot = coordinator
        .run()
        .await
        .with_context(|| format!("Fusion failed for {:?}", args.session))?;

    let mut queries = Vec::with_capacity(args.at.len());
    if let Some(mut tracker) = state.playback_tracker() {
        for &time in &args.at {
            let speakers = active_speaker_ids(tracker.update(time), time);
            queries.push(ActiveAt {
                time,
                speakers,
                current: tracker.current_speaker(time).cloned(),
                preview: preview_at(&session, &classifier, time).await,
            });
        }
    }

    let report = Report {
        snapshot: &snapshot,
        queries,
    };
    let json = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{}", json);

    info!(
        "Done: {}/{} speaker(s) matched",
        snapshot.matched_count(),
        snapshot.speakers.len()
    );
    Ok(())
}

/// Overlay boxes for the recorded frame nearest `time`; empty when there is none
async fn preview_at(session: &SessionRecording, classifier: &PreviewClassifier, time: f64) -> Vec<FaceBox> {
    let frame = match session.frame_at(time).await {
        Ok(Some(frame)) => frame,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!("No preview at {:.3}s: {}", time, e);
            return Vec::new();
        }
    };
    match RecordedDetector.detect(&frame) {
        Ok(observations) => classifier.classify(&observations, frame.height),
        Err(e) => {
            warn!("No preview at {:.3}s: {}", time, e);
            Vec::new()
        }
    }
}
