//! Scheduler Timing Tests
//!
//! Drives the frame scheduler with synthetic display callbacks and checks the
//! frame-rate cap, pausing and the resize quiet period.

use liquid::quality::{QualityTier, TierLevel};
use liquid::simulation::{
    FrameScheduler, ResizeDebouncer, TickDecision, Viewport, MAX_DT, RESIZE_QUIET_MS,
};

/// Indices of the callbacks that ran a solver step.
fn stepped_callbacks(scheduler: &mut FrameScheduler, spacing_ms: f64, count: usize) -> Vec<usize> {
    (0..count)
        .filter(|&i| {
            matches!(
                scheduler.tick(1000.0 + i as f64 * spacing_ms, true),
                TickDecision::Step { .. }
            )
        })
        .collect()
}

#[test]
fn thirty_fps_cap_skips_fast_callbacks() {
    let tier = QualityTier::for_level(TierLevel::Low);
    assert_eq!(tier.frame_rate_cap, 30.0);
    let mut scheduler = FrameScheduler::for_tier(&tier);

    let steps = stepped_callbacks(&mut scheduler, 10.0, 300);
    assert!(steps.len() > 1);
    for pair in steps.windows(2) {
        let gap = pair[1] - pair[0];
        // 10 ms callbacks against a 33.3 ms cadence land 3 or 4 apart, never every one
        assert!(gap >= 3, "steps at callbacks {} and {}", pair[0], pair[1]);
        assert!(gap <= 4, "steps at callbacks {} and {}", pair[0], pair[1]);
    }

    // the cadence averages out to the cap rather than the slower 40 ms
    let first = steps[0] as f64 * 10.0;
    let last = steps[steps.len() - 1] as f64 * 10.0;
    let mean_spacing = (last - first) / (steps.len() - 1) as f64;
    assert!(
        (mean_spacing - 1000.0 / 30.0).abs() < 1.0,
        "mean spacing {mean_spacing} ms"
    );
    // three seconds of callbacks
    assert!(steps.len() >= 89 && steps.len() <= 91, "{} steps", steps.len());
}

#[test]
fn cap_matching_refresh_steps_every_frame() {
    let period = 1000.0 / 60.0;
    for (cap, expected) in [(60.0, 600usize), (30.0, 300)] {
        let mut scheduler = FrameScheduler::new(cap);
        let steps = (0..600)
            .filter(|&i| {
                let jitter = [0.0, 0.3, -0.3, 0.1][i % 4];
                let now = i as f64 * period + jitter;
                matches!(scheduler.tick(now, true), TickDecision::Step { .. })
            })
            .count();
        assert!(
            steps + 5 >= expected && steps <= expected + 1,
            "cap {cap}: {steps} steps in ten seconds"
        );
    }
}

#[test]
fn slow_callbacks_step_every_time() {
    let mut scheduler = FrameScheduler::new(30.0);
    let steps = stepped_callbacks(&mut scheduler, 50.0, 20);
    assert_eq!(steps.len(), 20);
}

#[test]
fn step_dt_is_elapsed_time_clamped() {
    let mut scheduler = FrameScheduler::new(60.0);
    assert!(matches!(scheduler.tick(0.0, true), TickDecision::Step { .. }));
    match scheduler.tick(20.0, true) {
        TickDecision::Step { dt } => assert!((dt - 0.020).abs() < 1e-6),
        other => panic!("expected a step, got {other:?}"),
    }
    match scheduler.tick(520.0, true) {
        TickDecision::Step { dt } => assert_eq!(dt, MAX_DT),
        other => panic!("expected a step, got {other:?}"),
    }
}

#[test]
fn hidden_window_does_no_work() {
    let mut scheduler = FrameScheduler::new(60.0);
    for i in 0..100 {
        assert_eq!(scheduler.tick(i as f64 * 16.0, false), TickDecision::Paused);
    }
}

#[test]
fn resize_waits_for_quiet() {
    let mut debouncer = ResizeDebouncer::default();
    let mut now = 0.0;
    for i in 0..10 {
        debouncer.notify(now, Viewport::new(800.0 + i as f32 * 10.0, 600.0, 1.0));
        now += 16.0;
        assert_eq!(debouncer.poll(now), None);
    }
    assert!(debouncer.is_pending());
    let settled = debouncer.poll(now - 16.0 + RESIZE_QUIET_MS);
    assert_eq!(settled, Some(Viewport::new(890.0, 600.0, 1.0)));
    assert!(!debouncer.is_pending());
}
