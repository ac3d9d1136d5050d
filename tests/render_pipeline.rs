//! Render pipeline and blank-page detection through the viewer shell

use std::time::{Duration, Instant};

use crossterm::event::KeyCode;
use readroom::config::ViewerConfig;
use readroom::engine::testing::{FakeEngine, FakePage};
use readroom::notify::NoticeLevel;
use readroom::render::ViewportSize;
use readroom::sync::{LocalProgressCache, MemoryProgressStore};
use readroom::Viewer;

fn open_viewer(engine: FakeEngine, t0: Instant) -> Viewer<MemoryProgressStore> {
    Viewer::open(
        "book-render",
        engine,
        Vec::new(),
        ViewportSize::new(1000, 1000),
        None,
        LocalProgressCache::ephemeral(),
        &ViewerConfig::default(),
        t0,
    )
}

/// Pump with a fixed logical time until the predicate holds or a real-time
/// deadline passes.
fn pump_until<F>(viewer: &mut Viewer<MemoryProgressStore>, at: Instant, mut done: F)
where
    F: FnMut(&Viewer<MemoryProgressStore>) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        viewer.pump(at);
        if done(viewer) {
            return;
        }
        assert!(Instant::now() < deadline, "condition never held");
        std::thread::sleep(Duration::from_millis(5));
    }
}

fn mixed_document() -> FakeEngine {
    FakeEngine::new(vec![
        FakePage::white(500.0, 1000.0),
        FakePage::textured(500.0, 1000.0),
        FakePage::textured(500.0, 1000.0),
    ])
}

#[test]
fn blank_page_raises_a_dismissible_warning() {
    let t0 = Instant::now();
    let mut viewer = open_viewer(mixed_document(), t0);

    pump_until(&mut viewer, t0, |v| v.blank_flag(1).is_some());

    assert_eq!(viewer.blank_flag(1), Some(true));
    let notice = viewer.notices().current().expect("warning expected");
    assert_eq!(notice.level, NoticeLevel::Warning);
    assert!(notice.message.contains("blank"));

    viewer.dismiss_notice();
    assert!(viewer.notices().is_empty());
}

#[test]
fn blank_warning_auto_clears_after_its_duration() {
    let t0 = Instant::now();
    let mut viewer = open_viewer(mixed_document(), t0);

    pump_until(&mut viewer, t0, |v| v.blank_flag(1).is_some());
    assert!(!viewer.notices().is_empty());

    viewer.pump(t0 + Duration::from_secs(11));
    assert!(viewer.notices().is_empty());
}

#[test]
fn navigating_to_a_non_blank_page_supersedes_the_warning() {
    let t0 = Instant::now();
    let mut viewer = open_viewer(mixed_document(), t0);

    pump_until(&mut viewer, t0, |v| v.blank_flag(1).is_some());
    assert!(!viewer.notices().is_empty());

    viewer.handle_key(KeyCode::Right, t0);
    pump_until(&mut viewer, t0, |v| v.blank_flag(2).is_some());

    assert_eq!(viewer.blank_flag(2), Some(false));
    assert!(viewer.notices().is_empty(), "stale blank warning must clear");
}

#[test]
fn rezoom_reanalyzes_the_page_at_the_new_raster() {
    let t0 = Instant::now();
    let mut viewer = open_viewer(mixed_document(), t0);

    pump_until(&mut viewer, t0, |v| v.blank_flag(1).is_some());
    let first_scale = viewer.telemetry().render_scale.unwrap();

    viewer.handle_key(KeyCode::Char('+'), t0);
    pump_until(&mut viewer, t0, |v| {
        v.telemetry().render_scale.is_some_and(|s| s != first_scale)
    });

    // Still blank at the new scale; the flag was recomputed, not carried over
    assert_eq!(viewer.blank_flag(1), Some(true));
}

#[test]
fn zoom_stays_clamped_through_the_keyboard_surface() {
    let t0 = Instant::now();
    let mut viewer = open_viewer(mixed_document(), t0);

    for _ in 0..20 {
        viewer.handle_key(KeyCode::Char('+'), t0);
    }
    assert_eq!(viewer.telemetry().zoom_percent, 200);

    for _ in 0..20 {
        viewer.handle_key(KeyCode::Char('-'), t0);
    }
    assert_eq!(viewer.telemetry().zoom_percent, 50);
}

#[test]
fn rapid_navigation_only_commits_the_final_page() {
    let t0 = Instant::now();
    let engine = FakeEngine::new(vec![
        FakePage::textured(500.0, 1000.0),
        FakePage::textured(500.0, 1000.0),
        FakePage::textured(500.0, 1000.0),
    ])
    .with_render_delay(Duration::from_millis(40));
    let mut viewer = open_viewer(engine, t0);

    // Wait for the document, then supersede the initial render twice while
    // it is still in flight
    pump_until(&mut viewer, t0, |v| v.controller().document_ready());
    viewer.handle_key(KeyCode::Right, t0);
    viewer.handle_key(KeyCode::Right, t0);

    pump_until(&mut viewer, t0, |v| v.blank_flag(3).is_some());

    // Blank flags are populated only from committed frames: the superseded
    // renders for pages 1 and 2 never committed
    assert_eq!(viewer.blank_flag(1), None);
    assert_eq!(viewer.blank_flag(2), None);
    assert_eq!(viewer.telemetry().page, 3);
}

#[test]
fn fullscreen_toggles_and_escape_closes() {
    let t0 = Instant::now();
    let mut viewer = open_viewer(mixed_document(), t0);

    viewer.handle_key(KeyCode::Char('f'), t0);
    assert!(viewer.telemetry().fullscreen);
    viewer.handle_key(KeyCode::Char('f'), t0);
    assert!(!viewer.telemetry().fullscreen);

    viewer.handle_key(KeyCode::Esc, t0);
    assert!(viewer.is_closed());
}

#[test]
fn broken_document_surfaces_a_blocking_load_error() {
    let t0 = Instant::now();
    let mut viewer = open_viewer(FakeEngine::broken(), t0);

    pump_until(&mut viewer, t0, |v| v.load_error().is_some());
    assert!(viewer.load_error().unwrap().contains("malformed"));
}
