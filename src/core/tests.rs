use super::{EventGate, Granularity, ManualClock, RateGate, SplitGate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

fn frozen_gate(rate: u64, period: Duration) -> (RateGate<ManualClock>, ManualClock) {
    let clock = ManualClock::from_wall_clock("2017-01-01 12:00:00.000 UTC", 0).unwrap();
    let gate = RateGate::with_clock(rate, period, Granularity::Auto, clock.clone()).unwrap();
    (gate, clock)
}

/// Offer one event per millisecond for `millis` milliseconds.
fn drive_one_per_ms(
    gate: &mut RateGate<ManualClock>,
    clock: &ManualClock,
    millis: usize,
) -> usize {
    let mut admitted = 0;
    for _ in 0..millis {
        if gate.decide() {
            admitted += 1;
        }
        clock.advance_by(1);
    }
    admitted
}

#[test]
fn test_burst_admits_one_sub_period_allowance() {
    // 800 per second results in 16 events per 20 ms
    let (mut gate, _clock) = frozen_gate(800, Duration::from_secs(1));

    let admitted = (0..800).filter(|_| gate.decide()).count();
    assert_eq!(admitted, 16);
}

#[test]
fn test_burst_reopens_after_one_sub_period() {
    let (mut gate, clock) = frozen_gate(800, Duration::from_secs(1));
    for _ in 0..800 {
        gate.decide();
    }

    // Rejected attempts are not counted, so only the admitted 16 are paid back
    clock.advance_by(19);
    assert!(!gate.decide());
    clock.advance_by(1);
    assert!(gate.decide());
}

#[test]
fn test_burst_registered_by_every_attempt_holds_full_period() {
    // Burst of 800 at 800 per second: still closed at 991 ms, open at 1000 ms
    let (mut gate, clock) = frozen_gate(800, Duration::from_secs(1));

    let mut admitted = 0;
    for _ in 0..800 {
        if gate.open() {
            admitted += 1;
        }
        gate.register();
    }
    assert_eq!(admitted, 16);

    clock.advance_by(991);
    assert!(!gate.open());
    clock.advance_by(1);
    assert!(!gate.open());
    clock.advance_by(8);
    assert!(gate.open());
}

#[test]
fn test_single_event_per_second() {
    let (mut gate, clock) = frozen_gate(1, Duration::from_secs(1));

    assert!(gate.decide());
    clock.advance_by(999);
    assert!(!gate.decide());
    clock.advance_by(2);
    assert!(gate.decide());
}

#[test]
fn test_single_event_per_second_after_full_second() {
    let (mut gate, clock) = frozen_gate(1, Duration::from_secs(1));

    assert!(gate.decide());
    clock.advance_by(1001);
    assert!(gate.decide());
}

#[test]
fn test_under_flow() {
    // 2000 per second results in 40 events per 20 ms
    let (mut gate, clock) = frozen_gate(2000, Duration::from_secs(1));

    // 1000 events per second for 10 seconds
    assert_eq!(drive_one_per_ms(&mut gate, &clock, 10_000), 10_000);
}

#[test]
fn test_normal_flow() {
    // 1000 per second results in 20 events per 20 ms
    let (mut gate, clock) = frozen_gate(1000, Duration::from_secs(1));

    assert_eq!(drive_one_per_ms(&mut gate, &clock, 10_000), 10_000);
}

#[test]
fn test_over_flow() {
    // 800 per second results in 16 events per 20 ms
    let (mut gate, clock) = frozen_gate(800, Duration::from_secs(1));

    // 1000 events per second for 10 seconds
    assert_eq!(drive_one_per_ms(&mut gate, &clock, 10_000), 8000);
}

#[test]
fn test_bursty_over_flow_converges() {
    let (mut gate, clock) = frozen_gate(800, Duration::from_secs(1));
    let mut rng = StdRng::seed_from_u64(1);

    let mut admitted = 0;
    for _ in 0..10_000 {
        for _ in 0..rng.gen_range(1..=10) {
            if gate.decide() {
                admitted += 1;
            }
        }
        clock.advance_by(1);
    }

    assert_eq!(admitted, 8000);
}

#[test]
fn test_sparse_flow_admits_everything() {
    // 10 per second, one event every 150 ms
    let (mut gate, clock) = frozen_gate(10, Duration::from_secs(1));

    for i in 0..100 {
        assert!(gate.decide(), "event {i} should pass");
        clock.advance_by(150);
    }
}

#[test]
fn test_idle_then_burst_recovers() {
    let (mut gate, clock) = frozen_gate(800, Duration::from_secs(1));

    let admitted = (0..100).filter(|_| gate.decide()).count();
    assert_eq!(admitted, 16);

    // The first event after the pause rolls the idle sub-period over on its
    // own, then a fresh allowance of 16 follows
    clock.advance_by(1000);
    let admitted = (0..100).filter(|_| gate.decide()).count();
    assert_eq!(admitted, 17);
}

#[test]
fn test_reset_after_overload() {
    let (mut gate, clock) = frozen_gate(1, Duration::from_secs(1));
    assert!(gate.decide());
    assert!(!gate.decide());

    clock.advance_by(1);
    gate.reset();
    assert!(gate.decide());
    assert!(!gate.decide());
}

#[test]
fn test_deterministic_replay() {
    fn replay() -> Vec<bool> {
        let (mut gate, clock) = frozen_gate(300, Duration::from_secs(1));
        let mut rng = StdRng::seed_from_u64(7);
        let mut results = Vec::new();

        for _ in 0..2000 {
            clock.advance_by(rng.gen_range(0..5));
            results.push(gate.decide());
        }
        results
    }

    let first = replay();
    assert_eq!(first, replay());
    assert!(first.iter().any(|&passed| passed));
    assert!(first.iter().any(|&passed| !passed));
}

#[test]
fn test_sustained_over_limit_never_exceeds_target() {
    // 600 per second offered 5 events per ms
    let (mut gate, clock) = frozen_gate(600, Duration::from_secs(1));

    let mut admitted = 0;
    for _ in 0..5000 {
        for _ in 0..5 {
            if gate.decide() {
                admitted += 1;
            }
        }
        clock.advance_by(1);
    }

    // 5 seconds at 600 per second, within one sub-period allowance
    let target = 3000;
    let allowance = gate.target_rate() as usize;
    assert!(admitted <= target + allowance, "admitted {admitted}");
    assert!(admitted + allowance >= target, "admitted {admitted}");
}

#[test]
fn test_gate_as_trait_object() {
    let clock = ManualClock::frozen(0);
    let mut gates: Vec<Box<dyn EventGate>> = vec![
        Box::new(
            RateGate::with_clock(1, Duration::from_secs(1), Granularity::Auto, clock.clone())
                .unwrap(),
        ),
        Box::new(
            RateGate::with_clock(2, Duration::from_secs(1), Granularity::Auto, clock.clone())
                .unwrap(),
        ),
    ];

    let admitted: Vec<usize> = gates
        .iter_mut()
        .map(|gate| (0..5).filter(|_| gate.decide()).count())
        .collect();
    assert_eq!(admitted, vec![1, 2]);
}

#[test]
fn test_deadline_never_moves_backwards() {
    let (mut gate, clock) = frozen_gate(800, Duration::from_secs(1));
    let mut rng = StdRng::seed_from_u64(11);
    let mut last = gate.deadline_ns();

    for _ in 0..100_000 {
        match rng.gen_range(0..3) {
            0 => {
                gate.decide();
            }
            1 => gate.register(),
            _ => {
                gate.open();
            }
        }
        if rng.gen_bool(0.3) {
            clock.advance(Duration::from_micros(rng.gen_range(0..3000)));
        }

        let deadline = gate.deadline_ns();
        assert!(deadline >= last, "deadline moved from {last} to {deadline}");
        last = deadline;
    }
}
