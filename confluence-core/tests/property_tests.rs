//! Property tests for pipeline invariants.
//!
//! Uses proptest to verify:
//! 1. Conflict: opposing directions never produce a signal
//! 2. Monotone score: an extra agreeing source never lowers the score
//! 3. Ratchet monotonicity: trailing stops only tighten
//! 4. Breakeven permanence: once promoted, the stop never falls back

use chrono::{Duration, NaiveDate, NaiveDateTime};
use proptest::prelude::*;

use confluence_core::aggregator::{Aggregation, ConfluenceMethod, SignalAggregator};
use confluence_core::components::filter::Regime;
use confluence_core::components::signal::BotSignal;
use confluence_core::domain::{Bar, Instrument, Side};
use confluence_core::exit::{
    Breakeven, BreakevenTrigger, EntryContext, ExitMachine, ExitPlan, ExitState, OpenRequest,
    ProfitMode, StopMode,
};

// ── Strategies (proptest) ────────────────────────────────────────────

const SOURCES: [&str; 5] = ["alpha", "bravo", "charlie", "delta", "echo"];

fn arb_method() -> impl Strategy<Value = ConfluenceMethod> {
    prop_oneof![
        Just(ConfluenceMethod::Count),
        Just(ConfluenceMethod::Strength),
        Just(ConfluenceMethod::Weighted),
    ]
}

fn arb_strength() -> impl Strategy<Value = f64> {
    0.0..=1.0_f64
}

fn arb_weights() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.1..5.0_f64, SOURCES.len())
}

fn arb_side() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Long), Just(Side::Short)]
}

/// Random walk of (open, high, low, close) moves in ticks around 100.00.
fn arb_path() -> impl Strategy<Value = Vec<(i32, i32, i32)>> {
    prop::collection::vec((-20..=20i32, 0..=15i32, 0..=15i32), 1..60)
}

fn aggregator(method: ConfluenceMethod, weights: &[f64]) -> SignalAggregator {
    SignalAggregator::new(
        method,
        0.0,
        SOURCES
            .iter()
            .zip(weights)
            .map(|(name, w)| (name.to_string(), *w)),
    )
}

fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 1)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap()
}

/// Build tick-aligned bars from a path of (close move, upper wick, lower wick).
fn bars_from_path(path: &[(i32, i32, i32)]) -> Vec<Bar> {
    let tick = 0.01;
    let mut close_ticks = 10_000i64;
    path.iter()
        .enumerate()
        .map(|(i, &(delta, up, down))| {
            let open_ticks = close_ticks;
            close_ticks += delta as i64;
            let high = open_ticks.max(close_ticks) + up as i64;
            let low = open_ticks.min(close_ticks) - down as i64;
            Bar {
                symbol: "TEST".into(),
                timestamp: start() + Duration::minutes(i as i64 + 1),
                open: open_ticks as f64 * tick,
                high: high as f64 * tick,
                low: low as f64 * tick,
                close: close_ticks as f64 * tick,
                volume: 100,
            }
        })
        .collect()
}

fn open_machine(side: Side, plan: ExitPlan) -> ExitMachine {
    let mut machine = ExitMachine::new(Instrument::new("TEST", 0.01, 1.0), 0.0);
    machine
        .open(OpenRequest {
            side,
            reference_price: 100.0,
            time: start(),
            quantity: 1.0,
            plan,
            atr: None,
            context: EntryContext {
                sources: vec!["alpha".into()],
                confluence_score: 100.0,
                regime: Regime::Undetected,
                session: "rth".into(),
            },
        })
        .unwrap();
    machine
}

/// Stop tightening for `side`: a long stop moving up, a short stop down.
fn loosened(side: Side, before: f64, after: f64) -> bool {
    match side {
        Side::Long => after < before - 1e-9,
        Side::Short => after > before + 1e-9,
    }
}

// ── 1. Conflict ──────────────────────────────────────────────────────

proptest! {
    /// Any Long alongside any Short voids the bar.
    #[test]
    fn opposing_signals_never_emit(
        method in arb_method(),
        weights in arb_weights(),
        long_strength in arb_strength(),
        short_strength in arb_strength(),
        long_idx in 0..SOURCES.len(),
        offset in 1..SOURCES.len(),
    ) {
        let short_idx = (long_idx + offset) % SOURCES.len();
        let agg = aggregator(method, &weights);
        let result = agg.aggregate(&[
            BotSignal::long(SOURCES[long_idx], long_strength),
            BotSignal::short(SOURCES[short_idx], short_strength),
        ]);
        let is_conflict = matches!(result, Aggregation::Conflict { .. });
        prop_assert!(is_conflict);
    }
}

// ── 2. Monotone score ────────────────────────────────────────────────

proptest! {
    /// Adding one more agreeing source never lowers the score, and the score
    /// stays within [0, 100].
    #[test]
    fn extra_agreeing_source_never_lowers_score(
        method in arb_method(),
        weights in arb_weights(),
        strengths in prop::collection::vec(arb_strength(), SOURCES.len()),
        count in 1..SOURCES.len(),
    ) {
        let agg = aggregator(method, &weights);
        let signals: Vec<BotSignal> = SOURCES
            .iter()
            .zip(&strengths)
            .map(|(name, s)| BotSignal::short(*name, *s))
            .collect();

        let score = |n: usize| match agg.aggregate(&signals[..n]) {
            Aggregation::Signal(s) | Aggregation::BelowThreshold(s) => s.confluence_score,
            other => panic!("unexpected {other:?}"),
        };
        let before = score(count);
        let after = score(count + 1);
        prop_assert!(after >= before - 1e-9, "{before} -> {after}");
        prop_assert!((0.0..=100.0).contains(&after));
    }
}

// ── 3. Ratchet monotonicity ──────────────────────────────────────────

proptest! {
    /// ATR trailing never loosens, whatever the ATR does.
    #[test]
    fn atr_trail_only_tightens(
        side in arb_side(),
        path in arb_path(),
        atrs in prop::collection::vec(0.01..2.0_f64, 60),
        mult in 0.5..4.0_f64,
    ) {
        let plan = ExitPlan {
            initial_stop_ticks: 500.0,
            stop: StopMode::AtrTrail { atr_multiplier: mult },
            profit: ProfitMode::Fixed { target_ticks: 5_000.0 },
            breakeven: None,
        };
        let mut machine = open_machine(side, plan);
        for (bar, atr) in bars_from_path(&path).iter().zip(&atrs) {
            let before = machine.position().map(|p| p.stop_price());
            machine.on_bar(bar, Some(*atr));
            if let (Some(before), Some(after)) = (before, machine.position().map(|p| p.stop_price())) {
                prop_assert!(!loosened(side, before, after), "{before} -> {after}");
            }
        }
    }

    /// High/low trailing never loosens.
    #[test]
    fn high_low_trail_only_tightens(
        side in arb_side(),
        path in arb_path(),
        offset in 1.0..50.0_f64,
    ) {
        let plan = ExitPlan {
            initial_stop_ticks: 500.0,
            stop: StopMode::HighLowTrail { offset_ticks: offset.round() },
            profit: ProfitMode::Fixed { target_ticks: 5_000.0 },
            breakeven: None,
        };
        let mut machine = open_machine(side, plan);
        for bar in bars_from_path(&path) {
            let before = machine.position().map(|p| p.stop_price());
            machine.on_bar(&bar, None);
            if let (Some(before), Some(after)) = (before, machine.position().map(|p| p.stop_price())) {
                prop_assert!(!loosened(side, before, after), "{before} -> {after}");
            }
        }
    }
}

// ── 4. Breakeven permanence ──────────────────────────────────────────

proptest! {
    /// Once armed, the machine stays armed and the stop never falls back
    /// behind the breakeven level.
    #[test]
    fn breakeven_is_never_reversed(
        side in arb_side(),
        path in arb_path(),
        trigger in 5..40i32,
        offset in 0..5i32,
    ) {
        let plan = ExitPlan {
            initial_stop_ticks: 300.0,
            stop: StopMode::FixedStop,
            profit: ProfitMode::Fixed { target_ticks: 5_000.0 },
            breakeven: Some(Breakeven {
                trigger: BreakevenTrigger::FixedTicks { ticks: trigger as f64 },
                offset_ticks: offset as f64,
            }),
        };
        let instrument = Instrument::new("TEST", 0.01, 1.0);
        let be_level = instrument.offset(100.0, side, offset as f64);
        let mut machine = open_machine(side, plan);
        let mut armed = false;
        for bar in bars_from_path(&path) {
            machine.on_bar(&bar, None);
            let Some(position) = machine.position() else { break };
            if armed {
                prop_assert_eq!(machine.state(), ExitState::BreakevenArmed);
                prop_assert!(!loosened(side, be_level, position.stop_price()));
            }
            armed = position.breakeven_armed;
            if armed {
                prop_assert!(position.mfe_ticks >= trigger as f64);
            }
        }
    }
}
