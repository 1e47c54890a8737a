use std::time::Duration;

use fallwatch::{
    BoundingBox, Detection, DetectionSample, FallPersistenceState, NoSignalPolicy, RenderConfig,
};

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

fn fallen(at: Duration) -> DetectionSample {
    DetectionSample::new(
        vec![
            Detection::new("person", 0.95, BoundingBox::new(0.0, 0.0, 40.0, 80.0)),
            Detection::new("fallen", 0.82, BoundingBox::new(50.0, 60.0, 150.0, 110.0)),
        ],
        320,
        240,
        at,
    )
}

fn nothing(at: Duration) -> DetectionSample {
    DetectionSample::empty(320, 240, at)
}

fn run(state: &mut FallPersistenceState, cfg: &RenderConfig, samples: &[DetectionSample]) -> Vec<bool> {
    samples
        .iter()
        .map(|s| state.update(s, s.captured_at, cfg))
        .collect()
}

#[test]
fn continuous_run_turns_persistent_at_threshold() {
    let cfg = RenderConfig::default();
    let mut state = FallPersistenceState::new();
    let samples: Vec<_> = [0, 500, 1000, 1500, 2000, 2500]
        .into_iter()
        .map(|t| fallen(ms(t)))
        .collect();

    let decisions = run(&mut state, &cfg, &samples);
    assert_eq!(decisions, vec![false, false, false, false, true, true]);
    assert_eq!(state.window_start(), Some(ms(0)));
    assert_eq!(state.elapsed(), ms(2500));
}

#[test]
fn one_gap_restarts_window_and_never_alerts() {
    let cfg = RenderConfig::default();
    let mut state = FallPersistenceState::new();
    let samples = vec![
        fallen(ms(0)),
        fallen(ms(500)),
        fallen(ms(1000)),
        nothing(ms(1500)),
        fallen(ms(2000)),
        fallen(ms(2500)),
        fallen(ms(3000)),
        fallen(ms(3500)),
    ];

    let decisions = run(&mut state, &cfg, &samples);
    assert!(decisions.iter().all(|p| !p), "got {:?}", decisions);
    assert_eq!(state.window_start(), Some(ms(2000)));
}

#[test]
fn interrupted_run_must_accumulate_full_threshold_again() {
    let cfg = RenderConfig::default();
    let mut state = FallPersistenceState::new();
    let mut samples: Vec<_> = (0..=4).map(|i| fallen(ms(i * 500))).collect();
    samples.push(nothing(ms(2500)));
    samples.extend((6..=10).map(|i| fallen(ms(i * 500))));

    let decisions = run(&mut state, &cfg, &samples);
    assert!(decisions[4], "first run reaches 2.0s");
    assert!(!decisions[5], "gap clears the alert");
    assert_eq!(&decisions[6..10], &[false, false, false, false]);
    assert!(decisions[10], "second run reaches 2.0s at t=5.0");
    assert_eq!(state.window_start(), Some(ms(3000)));
}

#[test]
fn empty_sample_always_resets() {
    let cfg = RenderConfig::default();
    let mut state = FallPersistenceState::new();
    run(
        &mut state,
        &cfg,
        &[fallen(ms(0)), fallen(ms(1000)), fallen(ms(2000)), fallen(ms(9000))],
    );
    assert!(state.persistent());

    assert!(!state.update(&nothing(ms(9100)), ms(9100), &cfg));
    assert_eq!(state.window_start(), None);
    assert_eq!(state.last_seen(), None);

    // Already empty state stays empty.
    assert!(!state.update(&nothing(ms(9200)), ms(9200), &cfg));
    assert_eq!(state, FallPersistenceState::new());
}

#[test]
fn run_shorter_than_threshold_then_gap_is_never_persistent() {
    let cfg = RenderConfig::default();
    let mut state = FallPersistenceState::new();
    let mut samples: Vec<_> = (0..20).map(|i| fallen(ms(i * 100))).collect();
    samples.push(nothing(ms(2000)));

    let decisions = run(&mut state, &cfg, &samples);
    assert!(decisions.iter().all(|p| !p));
    assert_eq!(state.window_start(), None);
}

#[test]
fn non_qualifying_detections_count_as_absence() {
    let cfg = RenderConfig::default();
    let mut state = FallPersistenceState::new();
    state.update(&fallen(ms(0)), ms(0), &cfg);

    let low = DetectionSample::new(
        vec![Detection::new("lying", 0.4, BoundingBox::new(0.0, 0.0, 10.0, 10.0))],
        320,
        240,
        ms(500),
    );
    assert!(!state.update(&low, ms(500), &cfg));
    assert_eq!(state.window_start(), None);

    let other = DetectionSample::new(
        vec![Detection::new("person", 0.99, BoundingBox::new(0.0, 0.0, 10.0, 10.0))],
        320,
        240,
        ms(1000),
    );
    state.update(&fallen(ms(700)), ms(700), &cfg);
    assert!(!state.update(&other, ms(1000), &cfg));
    assert_eq!(state.window_start(), None);
}

#[test]
fn custom_threshold_and_classes() {
    let cfg = RenderConfig {
        persistence_threshold: ms(500),
        qualifying_classes: fallwatch::ClassSet::new(["collapsed"]),
        ..RenderConfig::default()
    };
    let mut state = FallPersistenceState::new();
    let collapsed = |t| {
        DetectionSample::new(
            vec![Detection::new("Collapsed", 0.6, BoundingBox::new(0.0, 0.0, 10.0, 10.0))],
            320,
            240,
            ms(t),
        )
    };
    assert!(!state.update(&fallen(ms(0)), ms(0), &cfg));
    assert!(!state.update(&collapsed(100), ms(100), &cfg));
    assert!(state.update(&collapsed(600), ms(600), &cfg));
}

#[test]
fn no_signal_hold_and_reset_policies() {
    let hold = RenderConfig::default();
    let mut state = FallPersistenceState::new();
    run(&mut state, &hold, &[fallen(ms(0)), fallen(ms(1200))]);
    assert!(!state.no_signal(&hold));
    assert_eq!(state.window_start(), Some(ms(0)));
    assert!(state.update(&fallen(ms(2000)), ms(2000), &hold));

    let reset = RenderConfig {
        no_signal: NoSignalPolicy::Reset,
        ..RenderConfig::default()
    };
    let mut state = FallPersistenceState::new();
    run(&mut state, &reset, &[fallen(ms(0)), fallen(ms(1200))]);
    assert!(!state.no_signal(&reset));
    assert_eq!(state.window_start(), None);
    assert!(!state.update(&fallen(ms(2000)), ms(2000), &reset));
}
