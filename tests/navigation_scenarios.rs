use glyphdeck::navigator::{LOCK_DURATION_MS, WHEEL_TRIGGER};
use glyphdeck::ripple::RIPPLE_CAPACITY;
use glyphdeck::schema::{Scene, TapeInput};
use glyphdeck::section::Side;
use glyphdeck::stage::Stage;
use glyphdeck::surface::TextSurface;

const WIDTH: f32 = 1000.0;
const HEIGHT: f32 = 800.0;

fn three_sections() -> Stage<TextSurface> {
    let scene: Scene = serde_yaml::from_str(
        r#"
viewport: { width: 1000, height: 800 }
fps: 50
duration: 5.0
sections:
  - { id: A, side: left }
  - { id: B, side: right }
  - { id: C, side: left }
"#,
    )
    .expect("scene should parse");
    scene.validate().expect("scene should validate");

    let mut stage = Stage::mount(&scene, Some(TextSurface::new()));
    stage.advance_to(0, |_, _| Ok(())).expect("first frame");
    stage
}

fn wheel_burst(stage: &mut Stage<TextSurface>, deltas: &[f32]) {
    for delta in deltas {
        let at = stage.now_ms() + 10;
        stage.advance_to(at, |_, _| Ok(())).expect("advance");
        stage.apply(&TapeInput::Wheel { delta_y: *delta });
    }
}

#[test]
fn starts_on_first_section() {
    let stage = three_sections();
    assert_eq!(stage.navigator().active_index(), 0);
    let published = stage.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].id, "A");
    assert_eq!(published[0].side, Side::Left);
}

#[test]
fn wheel_burst_moves_to_next_section_and_ripples_opposite_side() {
    let mut stage = three_sections();
    wheel_burst(&mut stage, &[30.0, 30.0, 30.0]);

    assert_eq!(stage.navigator().active_index(), 1);
    assert!(stage.navigator().is_locked());
    assert_eq!(stage.navigator().wheel_accumulator(), 0.0);

    let published = stage.published();
    assert_eq!(published.len(), 2);
    assert_eq!(published[1].id, "B");
    assert_eq!(published[1].side, Side::Right);

    let ripples = stage.ripples();
    let ripples = ripples.borrow();
    let newest = ripples.iter().last().expect("a ripple for the change");
    assert_eq!(newest.origin, (0.18 * WIDTH, 0.5 * HEIGHT));
    assert!(newest.origin.0 < WIDTH * 0.5, "B is right-side content");
}

#[test]
fn second_burst_while_locked_is_swallowed() {
    let mut stage = three_sections();
    wheel_burst(&mut stage, &[90.0]);
    wheel_burst(&mut stage, &[50.0, 50.0, 50.0]);

    assert_eq!(stage.navigator().active_index(), 1);
    assert_eq!(stage.navigator().wheel_accumulator(), 0.0);
    assert_eq!(stage.published().len(), 2);
}

#[test]
fn lock_expires_without_further_input() {
    let mut stage = three_sections();
    wheel_burst(&mut stage, &[90.0]);
    let locked_at = stage.now_ms();

    stage
        .advance_to(locked_at + LOCK_DURATION_MS, |_, _| Ok(()))
        .expect("advance");
    assert!(!stage.navigator().is_locked());

    wheel_burst(&mut stage, &[WHEEL_TRIGGER]);
    assert_eq!(stage.navigator().active_index(), 2);
    assert_eq!(stage.published().last().map(|e| e.id.as_str()), Some("C"));
}

#[test]
fn wheel_past_last_section_stays_in_bounds() {
    let mut stage = three_sections();
    stage.apply(&TapeInput::Key {
        key: "End".to_owned(),
    });
    let at = stage.now_ms() + LOCK_DURATION_MS;
    stage.advance_to(at, |_, _| Ok(())).expect("advance");

    wheel_burst(&mut stage, &[200.0]);
    assert_eq!(stage.navigator().active_index(), 2);
    assert!(!stage.navigator().is_locked());
    assert_eq!(stage.navigator().wheel_accumulator(), 0.0);
}

#[test]
fn end_key_skips_the_sections_in_between() {
    let mut stage = three_sections();
    stage.apply(&TapeInput::Key {
        key: "End".to_owned(),
    });
    let at = stage.now_ms() + LOCK_DURATION_MS;
    stage.advance_to(at, |_, _| Ok(())).expect("advance");

    let ids = stage
        .published()
        .iter()
        .map(|event| event.id.clone())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["A", "C"]);
    assert_eq!(stage.scroll_y(), 2.0 * HEIGHT);
}

#[test]
fn resize_does_not_change_the_active_section() {
    let mut stage = three_sections();
    stage.apply(&TapeInput::Key {
        key: "ArrowDown".to_owned(),
    });
    let at = stage.now_ms() + LOCK_DURATION_MS;
    stage.advance_to(at, |_, _| Ok(())).expect("advance");

    stage.apply(&TapeInput::Resize {
        width: WIDTH,
        height: HEIGHT / 2.0,
    });
    let at = stage.now_ms() + 100;
    stage.advance_to(at, |_, _| Ok(())).expect("advance");

    assert_eq!(stage.navigator().active_index(), 1);
    assert_eq!(stage.published().len(), 2);
    assert_eq!(stage.scroll_y(), HEIGHT / 2.0);
}

#[test]
fn touch_drag_up_steps_forward_once() {
    let mut stage = three_sections();
    stage.apply(&TapeInput::TouchStart {
        y: 500.0,
        fingers: 1,
    });
    stage.apply(&TapeInput::TouchMove { y: 420.0 });

    assert_eq!(stage.navigator().active_index(), 1);
    assert_eq!(stage.navigator().pending_touch_origin(), None);

    let at = stage.now_ms() + LOCK_DURATION_MS;
    stage.advance_to(at, |_, _| Ok(())).expect("advance");
    stage.apply(&TapeInput::TouchMove { y: 300.0 });

    assert_eq!(stage.navigator().active_index(), 1);
    assert_eq!(stage.published().len(), 2);
}

#[test]
fn ripple_collection_stays_bounded() {
    let mut stage = three_sections();
    for step in 0..10 {
        let key = if step % 2 == 0 { "ArrowDown" } else { "ArrowUp" };
        stage.apply(&TapeInput::Key {
            key: key.to_owned(),
        });
        let at = stage.now_ms() + LOCK_DURATION_MS;
        stage.advance_to(at, |_, _| Ok(())).expect("advance");
        assert!(stage.ripples().borrow().len() <= RIPPLE_CAPACITY);
    }
}
