use quickcheck::{QuickCheck, TestResult};

use kinescope_core::core::irq::{CpuLines, InputLine};
use kinescope_core::device::vector_arbiter::VECTOR_IDLE;
use kinescope_core::device::{IrqVectorArbiter, SoundLatch, SourceRequest, VectorAction, VectorSource};

fn sources() -> [VectorSource; 2] {
    [VectorSource::YM2151, VectorSource::SOUND_LATCH]
}

// =================================================================
// Deferred application
// =================================================================

#[test]
fn test_requests_wait_for_synchronize() {
    let mut lines = CpuLines::new();
    let mut arb = IrqVectorArbiter::new();

    arb.request(VectorSource::SOUND_LATCH, VectorAction::Assert);
    assert_eq!(arb.vector(), VECTOR_IDLE);
    assert_eq!(arb.pending_requests(), 1);
    assert!(!lines.is_active(InputLine::Irq));

    arb.synchronize(&mut lines);
    assert_eq!(arb.vector(), 0xDF);
    assert!(lines.is_active(InputLine::Irq));
    assert_eq!(lines.vector(), 0xDF);
}

#[test]
fn test_both_sources_pending() {
    let mut lines = CpuLines::new();
    let mut arb = IrqVectorArbiter::new();
    arb.request(VectorSource::YM2151, VectorAction::Assert);
    arb.request(VectorSource::SOUND_LATCH, VectorAction::Assert);
    arb.synchronize(&mut lines);
    assert_eq!(arb.vector(), 0xCF);

    arb.request(VectorSource::YM2151, VectorAction::Clear);
    arb.synchronize(&mut lines);
    assert_eq!(lines.vector(), 0xDF);

    arb.request(VectorSource::SOUND_LATCH, VectorAction::Clear);
    arb.synchronize(&mut lines);
    assert_eq!(arb.vector(), VECTOR_IDLE);
    assert!(!lines.is_active(InputLine::Irq));
}

#[test]
fn test_numeric_request_codes() {
    let mut lines = CpuLines::new();
    let mut arb = IrqVectorArbiter::new();
    arb.request_code(1);
    arb.request_code(3);
    arb.request_code(2);
    arb.synchronize(&mut lines);
    assert_eq!(arb.vector(), 0xDF);
    arb.request_code(0);
    arb.synchronize(&mut lines);
    assert_eq!(arb.vector(), VECTOR_IDLE);
}

#[test]
fn test_reset_is_immediate_and_drops_queue() {
    let mut lines = CpuLines::new();
    let mut arb = IrqVectorArbiter::new();
    arb.request(VectorSource::YM2151, VectorAction::Assert);
    arb.synchronize(&mut lines);
    arb.request(VectorSource::SOUND_LATCH, VectorAction::Assert);

    arb.reset(&mut lines);
    assert_eq!(arb.vector(), VECTOR_IDLE);
    assert_eq!(arb.pending_requests(), 0);
    assert!(!lines.is_active(InputLine::Irq));
}

#[test]
fn test_latch_routes_through_arbiter() {
    let mut lines = CpuLines::new();
    let mut arb = IrqVectorArbiter::new();
    let mut latch = SoundLatch::new();

    latch.write(0x80, &mut SourceRequest::new(&mut arb, VectorSource::SOUND_LATCH));
    assert_eq!(arb.vector(), VECTOR_IDLE);
    arb.synchronize(&mut lines);
    assert_eq!(lines.vector(), 0xDF);

    assert_eq!(latch.read_and_acknowledge(&mut SourceRequest::new(&mut arb, VectorSource::SOUND_LATCH)), 0x80);
    arb.synchronize(&mut lines);
    assert!(!lines.is_active(InputLine::Irq));
}

#[test]
fn test_arbiter_line_survives_acknowledge() {
    let mut lines = CpuLines::new();
    let mut arb = IrqVectorArbiter::new();
    arb.request(VectorSource::YM2151, VectorAction::Assert);
    arb.synchronize(&mut lines);
    lines.acknowledge(InputLine::Irq);
    assert!(lines.is_active(InputLine::Irq));
    assert_eq!(arb.vector(), 0xEF);
}

// =================================================================
// Algebraic properties
// =================================================================

fn decode(ops: &[(bool, bool)]) -> Vec<(VectorSource, VectorAction)> {
    ops.iter()
        .map(|&(which, assert)| {
            let source = sources()[usize::from(which)];
            let action = if assert { VectorAction::Assert } else { VectorAction::Clear };
            (source, action)
        })
        .collect()
}

/// Vector after the last action per source; only that survives.
fn expected_vector(ops: &[(VectorSource, VectorAction)]) -> u8 {
    let mut vector = VECTOR_IDLE;
    for source in sources() {
        if let Some((_, action)) = ops.iter().rev().find(|(s, _)| *s == source)
            && *action == VectorAction::Assert
        {
            vector &= !source.mask();
        }
    }
    vector
}

fn run(ops: &[(VectorSource, VectorAction)]) -> (u8, bool) {
    let mut lines = CpuLines::new();
    let mut arb = IrqVectorArbiter::new();
    for &(source, action) in ops {
        arb.request(source, action);
    }
    arb.synchronize(&mut lines);
    (arb.vector(), lines.is_active(InputLine::Irq))
}

#[test]
fn prop_vector_depends_only_on_final_state() {
    fn prop(ops: Vec<(bool, bool)>) -> bool {
        let ops = decode(&ops);
        let (vector, active) = run(&ops);
        vector == expected_vector(&ops) && active == (vector != VECTOR_IDLE)
    }
    QuickCheck::new().quickcheck(prop as fn(Vec<(bool, bool)>) -> bool);
}

#[test]
fn prop_independent_sources_commute() {
    fn prop(a: bool, b: bool) -> bool {
        let action = |x: bool| if x { VectorAction::Assert } else { VectorAction::Clear };
        let forward = [(VectorSource::YM2151, action(a)), (VectorSource::SOUND_LATCH, action(b))];
        let backward = [forward[1], forward[0]];
        run(&forward) == run(&backward)
    }
    QuickCheck::new().quickcheck(prop as fn(bool, bool) -> bool);
}

#[test]
fn prop_repeating_a_request_is_idempotent() {
    fn prop(ops: Vec<(bool, bool)>) -> TestResult {
        let ops = decode(&ops);
        let Some(&last) = ops.last() else {
            return TestResult::discard();
        };
        let mut repeated = ops.clone();
        repeated.push(last);
        TestResult::from_bool(run(&ops) == run(&repeated))
    }
    QuickCheck::new().quickcheck(prop as fn(Vec<(bool, bool)>) -> TestResult);
}
