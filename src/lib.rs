pub mod audio;
pub mod calibration;
pub mod error;
pub mod events;
pub mod export;
pub mod gaze;
pub mod models;
pub mod responses;
pub mod sampling;
pub mod session;
pub mod settings;
pub mod ui;
mod utils;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use log::{info, warn};
use serde_json::Value;
use tokio::time::{sleep, Duration};

use audio::AudioBackend;
use events::StudyEvent;
use gaze::{ContentRegistry, SimulatedEngine, UiElement};
use models::{AnswerEvent, Rect, Viewport};
use session::{Collaborators, StudyController};
use settings::SettingsStore;
use ui::{ActiveQuestion, SharedViewport};

pub use error::{Result, TrackerError};

const DEFAULT_SETTINGS_FILE: &str = "gazetrace-settings.json";

/// Reads `RUST_LOG`, defaulting to `info`. Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}

fn audio_backend() -> Arc<dyn AudioBackend> {
    #[cfg(feature = "device-audio")]
    {
        Arc::new(audio::MicrophoneBackend)
    }
    #[cfg(not(feature = "device-audio"))]
    {
        Arc::new(audio::SyntheticBackend::new())
    }
}

/// Two questions stacked in a card, the way the questionnaire lays them out.
fn demo_page(registry: &ContentRegistry, viewport: &Viewport) {
    let card = registry.register(
        UiElement::new(
            "section",
            Rect::new(160.0, 80.0, viewport.width - 320.0, viewport.height - 160.0),
        )
        .with_class("question-card"),
    );
    registry.register(
        UiElement::new("p", Rect::new(200.0, 120.0, viewport.width - 400.0, 180.0))
            .with_id("q1-stem")
            .with_parent(card)
            .with_content("q1", "question"),
    );
    registry.register(
        UiElement::new("p", Rect::new(200.0, 360.0, viewport.width - 400.0, 180.0))
            .with_id("q2-stem")
            .with_parent(card)
            .with_content("q2", "question"),
    );
}

/// Headless walkthrough of one study session against a simulated gaze
/// engine: calibrate, record two questions with audio, export.
pub async fn run() -> anyhow::Result<()> {
    init_logging();
    info!("gazetrace starting up...");

    let settings_path = std::env::var_os("GAZETRACE_SETTINGS")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE));
    let settings = SettingsStore::new(settings_path).context("loading study settings")?;

    let viewport = Viewport::default();
    let registry = Arc::new(ContentRegistry::new());
    demo_page(&registry, &viewport);
    let questions = ActiveQuestion::new();

    let controller = StudyController::new(
        Collaborators {
            engine: Arc::new(SimulatedEngine::new(viewport)),
            hit_tester: registry,
            viewport: SharedViewport::new(viewport),
            questions: Arc::new(questions.clone()),
            audio_backend: audio_backend(),
        },
        settings.get(),
    );

    let mut events = controller.subscribe();
    let event_log = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match &event {
                StudyEvent::SampleProgress { .. } | StudyEvent::AudioStatusChanged(_) => {
                    log::debug!("{event:?}")
                }
                _ => info!("event: {event:?}"),
            }
        }
    });

    controller
        .initialize()
        .await
        .context("starting gaze engine")?;

    let progress = controller.start_calibration().await?;
    let clicks = progress.total_points * progress.clicks_per_point as usize;
    for _ in 0..clicks {
        let Some(target) = controller.snapshot().await.calibration.current_target else {
            break;
        };
        controller.calibration_click(target.x, target.y).await;
    }

    let session_id = controller.start_recording().await?;
    info!("recording demo session {session_id}");

    for (question, option) in [("q1", 2usize), ("q2", 0)] {
        questions.set(Some(question.to_string()));
        if let Err(err) = controller.start_audio().await {
            warn!("continuing without audio for {question}: {err}");
        }
        sleep(Duration::from_millis(1500)).await;
        if let Err(err) = controller.stop_audio().await {
            warn!("audio for {question} was not saved: {err}");
        }
        controller
            .record_answer(AnswerEvent {
                question_id: question.to_string(),
                option_index: Some(option),
                option_text: Some(format!("option {option}")),
                free_text: None,
            })
            .await;
    }
    questions.set(None);

    controller.stop_recording().await?;
    controller
        .set_demographics([
            ("age", Value::from(31)),
            ("handedness", Value::from("right")),
            ("vision", Value::from("corrected, contacts")),
        ])
        .await;

    let summary = controller.export_all().await.context("exporting session")?;
    info!(
        "wrote {} file(s) to {}",
        summary.written(),
        controller.settings().export_dir.display()
    );

    controller.shutdown().await;
    drop(controller);
    event_log.abort();
    Ok(())
}
