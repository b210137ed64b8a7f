use std::{
    io::Write,
    sync::{
        Arc, Mutex,
        atomic::AtomicBool,
    },
};

use landmark_ingest::{ReplayOptions, spawn_file_reader};
use tempfile::NamedTempFile;
use tracking_core::{
    ClickEvent, ControlLoop, CursorError, CursorSink, GestureLabel, HandLandmark, HandLandmarks,
    Landmark, ScreenSize, SharedState, landmarks::LANDMARK_COUNT,
};

#[derive(Clone, Debug, PartialEq, Eq)]
enum Action {
    Move(i32, i32),
    Press,
    Release,
}

#[derive(Clone, Default)]
struct RecordingCursor {
    actions: Arc<Mutex<Vec<Action>>>,
}

impl RecordingCursor {
    fn actions(&self) -> Vec<Action> {
        self.actions.lock().expect("actions lock").clone()
    }
}

impl CursorSink for RecordingCursor {
    fn move_to(&mut self, x: i32, y: i32) -> Result<(), CursorError> {
        self.actions.lock().expect("actions lock").push(Action::Move(x, y));
        Ok(())
    }

    fn press(&mut self) -> Result<(), CursorError> {
        self.actions.lock().expect("actions lock").push(Action::Press);
        Ok(())
    }

    fn release(&mut self) -> Result<(), CursorError> {
        self.actions.lock().expect("actions lock").push(Action::Release);
        Ok(())
    }
}

fn hand_line(x: f64, pinch: f64) -> String {
    let mut hand = HandLandmarks::new(vec![Landmark::new(0.5, 0.5); LANDMARK_COUNT]);
    hand.set(HandLandmark::IndexTip, Landmark::new(x, 0.5));
    hand.set(HandLandmark::ThumbTip, Landmark::new(x, 0.5 + pinch));
    serde_json::json!({ "landmarks": hand }).to_string()
}

fn recording(lines: &[String]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    for line in lines {
        writeln!(file, "{line}").expect("write");
    }
    file.flush().expect("flush");
    file
}

fn replay(file: &NamedTempFile) -> landmark_ingest::LandmarkFeed {
    spawn_file_reader(
        file.path(),
        ReplayOptions {
            fps: 200.0,
            looping: false,
        },
    )
    .expect("open recording")
}

#[test]
fn test_recorded_pinch_clicks_once() {
    let file = recording(&[
        hand_line(0.5, 0.2),
        hand_line(0.5, 0.2),
        hand_line(0.5, 0.02),
        hand_line(0.5, 0.02),
        hand_line(0.5, 0.02),
        hand_line(0.5, 0.2),
        r#"{"landmarks":null}"#.to_string(),
    ]);

    let state = Arc::new(SharedState::new());
    let cursor = RecordingCursor::default();
    let screen = ScreenSize::new(800, 600);
    let mut control = ControlLoop::new(replay(&file), cursor.clone(), state.clone(), screen);

    let mut events = Vec::new();
    let mut processed = 0;
    control
        .run(&AtomicBool::new(true), |report| {
            if let Some(report) = report {
                processed += 1;
                events.extend(report.event);
            }
        })
        .expect("replay ends cleanly");

    assert_eq!(processed, 7);
    assert_eq!(events, vec![ClickEvent::Press, ClickEvent::Release]);

    let actions = cursor.actions();
    let clicks: Vec<&Action> = actions
        .iter()
        .filter(|action| !matches!(action, Action::Move(..)))
        .collect();
    assert_eq!(clicks, vec![&Action::Press, &Action::Release]);
    assert_eq!(
        actions.iter().filter(|action| matches!(action, Action::Move(..))).count(),
        6
    );
    for action in &actions {
        if let Action::Move(x, y) = action {
            assert!((0..800).contains(x) && (0..600).contains(y));
        }
    }

    assert!(!state.is_hand_detected());
    assert_eq!(state.gesture(), GestureLabel::NoHand);
    assert!(!control.is_pressed());
}

#[test]
fn test_recording_ending_mid_pinch_releases_button() {
    let file = recording(&[hand_line(0.4, 0.2), hand_line(0.4, 0.01)]);

    let state = Arc::new(SharedState::new());
    let cursor = RecordingCursor::default();
    let mut control = ControlLoop::new(
        replay(&file),
        cursor.clone(),
        state,
        ScreenSize::new(1920, 1080),
    );
    control
        .run(&AtomicBool::new(true), |_| {})
        .expect("replay ends cleanly");

    let actions = cursor.actions();
    assert_eq!(actions.last(), Some(&Action::Release));
    assert!(actions.contains(&Action::Press));
    assert!(!control.is_pressed());
}

#[test]
fn test_disabled_cursor_only_tracks_state() {
    let file = recording(&[hand_line(0.5, 0.02), hand_line(0.5, 0.02)]);

    let state = Arc::new(SharedState::new());
    state.set_cursor_enabled(false);
    let cursor = RecordingCursor::default();
    let mut control = ControlLoop::new(
        replay(&file),
        cursor.clone(),
        state.clone(),
        ScreenSize::new(800, 600),
    );
    control
        .run(&AtomicBool::new(true), |_| {})
        .expect("replay ends cleanly");

    assert!(cursor.actions().is_empty());
    assert!(state.is_hand_detected());
    assert!(state.landmarks().is_some());
}
