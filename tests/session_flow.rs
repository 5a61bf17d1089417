use std::fs;
use std::sync::Arc;

use gazetrace_lib::audio::SyntheticBackend;
use gazetrace_lib::calibration::CalibrationPhase;
use gazetrace_lib::events::StudyEvent;
use gazetrace_lib::gaze::{ContentRegistry, SimulatedEngine, UiElement};
use gazetrace_lib::models::{AnswerEvent, Rect, Viewport};
use gazetrace_lib::session::{Collaborators, StudyController, StudyStatus};
use gazetrace_lib::settings::StudySettings;
use gazetrace_lib::ui::{ActiveQuestion, SharedViewport};
use tokio::time::{self, Duration};

fn controller(export_dir: std::path::PathBuf) -> (StudyController, ActiveQuestion) {
    let viewport = Viewport::new(1280.0, 800.0);
    let registry = ContentRegistry::new();
    registry.register(
        UiElement::new("main", Rect::new(0.0, 0.0, 1280.0, 800.0)).with_content("page", "layout"),
    );
    let questions = ActiveQuestion::new();
    let controller = StudyController::new(
        Collaborators {
            engine: Arc::new(SimulatedEngine::new(viewport)),
            hit_tester: Arc::new(registry),
            viewport: SharedViewport::new(viewport),
            questions: Arc::new(questions.clone()),
            audio_backend: Arc::new(SyntheticBackend::new()),
        },
        StudySettings {
            sampling_hz: 30.0,
            clicks_per_point: 3,
            export_dir,
            ..StudySettings::default()
        },
    );
    (controller, questions)
}

#[tokio::test(start_paused = true)]
async fn full_session_is_calibrated_recorded_and_exported() {
    let tmp = tempfile::tempdir().unwrap();
    let (controller, questions) = controller(tmp.path().to_path_buf());
    let mut events = controller.subscribe();

    controller.initialize().await.unwrap();
    assert_eq!(controller.status().await, StudyStatus::Ready);

    controller.start_calibration().await.unwrap();
    for _ in 0..27 {
        let target = controller
            .snapshot()
            .await
            .calibration
            .current_target
            .unwrap();
        controller.calibration_click(target.x, target.y).await.unwrap();
    }
    assert_eq!(
        controller.snapshot().await.calibration.phase,
        CalibrationPhase::Done
    );

    let session_id = controller.start_recording().await.unwrap();
    time::sleep(Duration::from_millis(200)).await;

    questions.set(Some("q1".into()));
    let segment_id = controller.start_audio().await.unwrap();
    time::sleep(Duration::from_millis(600)).await;
    let segment = controller.stop_audio().await.unwrap().unwrap();
    assert_eq!(segment.id, segment_id);
    assert!(segment.start_ms >= 200);
    assert!(segment.duration_ms >= 600);

    controller
        .record_answer(AnswerEvent {
            question_id: "q1".into(),
            option_index: Some(4),
            option_text: Some("strongly agree".into()),
            free_text: None,
        })
        .await;
    time::sleep(Duration::from_millis(200)).await;
    controller.stop_recording().await.unwrap();

    let summary = controller.export_all().await.unwrap();
    let gaze_path = summary.gaze.unwrap();
    assert_eq!(
        gaze_path.file_name().unwrap().to_str().unwrap(),
        format!("gaze_session_{session_id}.csv")
    );

    let gaze = fs::read_to_string(gaze_path).unwrap();
    let mut lines = gaze.lines();
    let header: Vec<&str> = lines.next().unwrap().split(',').collect();
    let t_col = header.iter().position(|h| *h == "t_ms").unwrap();
    let audio_col = header.iter().position(|h| *h == "audio_segment_id").unwrap();
    let content_col = header.iter().position(|h| *h == "content_id").unwrap();

    let rows: Vec<Vec<&str>> = lines.map(|line| line.split(',').collect()).collect();
    assert!(rows.len() > 20, "expected a second of rows, got {}", rows.len());

    let times: Vec<u64> = rows.iter().map(|row| row[t_col].parse().unwrap()).collect();
    assert!(times.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(rows.iter().all(|row| row[content_col] == "page"));
    assert!(rows.iter().any(|row| row[audio_col] == segment_id));
    assert!(rows.iter().any(|row| row[audio_col].is_empty()));

    let audio_log = fs::read_to_string(summary.audio_log.unwrap()).unwrap();
    assert!(audio_log.contains(&format!("{session_id},{segment_id},q1,")));
    assert_eq!(summary.audio_payloads.len(), 1);

    let mut saw_started = false;
    let mut saw_stopped = false;
    while let Ok(event) = events.try_recv() {
        match event {
            StudyEvent::RecordingStarted { session_id: id } => saw_started = id == session_id,
            StudyEvent::RecordingStopped { sample_count, .. } => {
                saw_stopped = sample_count == rows.len()
            }
            _ => {}
        }
    }
    assert!(saw_started && saw_stopped);

    controller.shutdown().await;
}
