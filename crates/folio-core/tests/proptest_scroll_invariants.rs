//! Property-based invariant tests for the scroll core.
//!
//! 1. Readiness opens exactly when the last tracked slot settles, never earlier,
//!    whatever the settle order and success/failure mix.
//! 2. `ease_in_out` stays in [0, 1], is monotone, and is point-symmetric.
//! 3. A tween lands exactly on its target at `ends_at`.
//! 4. The debouncer fires once per burst, counting every trigger.
//! 5. The bridge never holds more than one frame request, and after a frame
//!    with no animation running the container matches the window.
//! 6. Detach always releases every host resource.

use core::time::Duration;

use folio_core::animation::{SmoothScroll, ease_in_out};
use folio_core::debounce::Debouncer;
use folio_core::headless::{HeadlessHost, NodeId};
use folio_core::readiness::{LoadOutcome, ReadinessGate};
use folio_core::{ScrollHost, Section, SiteConfig, SiteController};
use proptest::prelude::*;

// ── Strategies ────────────────────────────────────────────────────────────

fn settle_plan() -> impl Strategy<Value = (usize, Vec<(usize, bool)>)> {
    (1usize..12).prop_flat_map(|n| {
        let order = Just((0..n).collect::<Vec<_>>()).prop_shuffle();
        let outcomes = prop::collection::vec(any::<bool>(), n);
        (Just(n), (order, outcomes).prop_map(|(o, f)| o.into_iter().zip(f).collect()))
    })
}

#[derive(Debug, Clone)]
enum Op {
    Scroll(f64),
    Frame,
    Wait(u64),
    Mutate,
    Navigate(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0.0f64..2300.0).prop_map(Op::Scroll),
        4 => Just(Op::Frame),
        1 => (1u64..200).prop_map(Op::Wait),
        1 => Just(Op::Mutate),
        1 => (0usize..4).prop_map(Op::Navigate),
    ]
}

fn attached_page() -> (HeadlessHost, NodeId, SiteController<HeadlessHost>) {
    let host = HeadlessHost::new();
    let container = host.create_container(2000.0);
    let config = SiteConfig::default().with_modules(Vec::<String>::new());
    let mut ctl = SiteController::new(host.clone(), &config, Vec::<String>::new());
    for (i, section) in Section::ALL.into_iter().enumerate() {
        let element = host.create_element(container, Some(section.dom_id()), 600.0 * i as f64);
        ctl.register(section, element);
    }
    ctl.set_container(Some(container));
    (host, container, ctl)
}

// ── Properties ────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn readiness_opens_on_last_settle((n, plan) in settle_plan()) {
        let urls: Vec<String> = (0..n).map(|i| format!("/img-{i}.webp")).collect();
        let mut gate = ReadinessGate::new(Vec::<String>::new(), urls.clone());
        let mut opened = 0;
        for (step, (slot, ok)) in plan.iter().enumerate() {
            prop_assert!(!gate.is_ready());
            let outcome = if *ok { LoadOutcome::Loaded } else { LoadOutcome::Failed };
            if gate.asset_settled(&urls[*slot], outcome) {
                opened += 1;
                prop_assert_eq!(step, n - 1);
            }
        }
        prop_assert!(gate.is_ready());
        prop_assert_eq!(opened, 1);
        let failed = plan.iter().filter(|(_, ok)| !ok).count();
        prop_assert_eq!(gate.failed_assets(), failed);
    }

    #[test]
    fn easing_is_bounded_monotone_symmetric(a in 0.0f64..=1.0, b in 0.0f64..=1.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let (e_lo, e_hi) = (ease_in_out(lo), ease_in_out(hi));
        prop_assert!((0.0..=1.0).contains(&e_lo));
        prop_assert!((0.0..=1.0).contains(&e_hi));
        prop_assert!(e_lo <= e_hi + 1e-12);
        prop_assert!((ease_in_out(a) + ease_in_out(1.0 - a) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn tween_lands_on_target(
        from in -5000.0f64..5000.0,
        to in -5000.0f64..5000.0,
        start in 0u64..10_000,
        duration in 0u64..2_000,
    ) {
        let tween = SmoothScroll::new(
            from,
            to,
            Duration::from_millis(start),
            Duration::from_millis(duration),
        );
        let end = tween.sample(tween.ends_at());
        prop_assert!(end.finished);
        prop_assert_eq!(end.position, to);
    }

    #[test]
    fn debouncer_fires_once_per_burst(gaps in prop::collection::vec(0u64..149, 1..30)) {
        let delay = Duration::from_millis(150);
        let mut d = Debouncer::new(delay);
        let mut now = Duration::ZERO;
        for gap in &gaps {
            now += Duration::from_millis(*gap);
            d.trigger(now);
            prop_assert_eq!(d.poll(now), None);
        }
        let deadline = now + delay;
        prop_assert_eq!(d.poll(deadline - Duration::from_millis(1)), None);
        prop_assert_eq!(d.poll(deadline), Some(gaps.len() as u32));
        prop_assert_eq!(d.poll(deadline + delay), None);
        prop_assert_eq!(d.fire_count(), 1);
    }

    #[test]
    fn frames_coalesce_and_sync_holds(ops in prop::collection::vec(op(), 1..60)) {
        let (host, container, mut ctl) = attached_page();
        for op in ops {
            match op {
                Op::Scroll(y) => {
                    host.user_scroll(y);
                    host.dispatch(&mut ctl);
                }
                Op::Frame => host.advance_frame(&mut ctl),
                Op::Wait(ms) => host.advance(&mut ctl, Duration::from_millis(ms)),
                Op::Mutate => {
                    host.mutate(container);
                    host.dispatch(&mut ctl);
                }
                Op::Navigate(i) => {
                    ctl.scroll_to(Section::ALL[i]);
                }
            }
            prop_assert!(host.live_frames() <= 1);
            let state = ctl.scroll_state();
            if state.active_animation.is_none() && host.live_frames() == 0 && host.queued_events() == 0 {
                prop_assert_eq!(host.scroll_top(&container), host.window_scroll_y());
            }
        }
    }

    #[test]
    fn detach_releases_everything(ops in prop::collection::vec(op(), 0..30)) {
        let (host, container, mut ctl) = attached_page();
        for op in ops {
            match op {
                Op::Scroll(y) => host.user_scroll(y),
                Op::Frame => host.advance_frame(&mut ctl),
                Op::Wait(ms) => host.advance(&mut ctl, Duration::from_millis(ms)),
                Op::Mutate => host.mutate(container),
                Op::Navigate(i) => {
                    ctl.scroll_to(Section::ALL[i]);
                }
            }
        }
        ctl.detach();
        prop_assert_eq!(host.live_subscriptions(), 0);
        prop_assert_eq!(host.live_frames(), 0);
        prop_assert_eq!(host.live_timers(), 0);
        prop_assert!(ctl.scroll_state().active_animation.is_none());
        prop_assert!(ctl.scroll_state().document_height.is_none());
    }
}
