//! End-to-end checks driving the full search on small circuits, with
//! counterexample traces replayed against a reference simulator.

use caracal::{check, Aig, Direction, ModelError, SearchConfig, Verdict};

fn config(direction: Direction) -> SearchConfig {
    SearchConfig {
        direction,
        ..SearchConfig::default()
    }
}

fn both_directions() -> Vec<SearchConfig> {
    vec![config(Direction::Backward), config(Direction::Forward)]
}

/// Evaluates one step: given latch values and inputs, returns the value of
/// the designated bad literal and the next latch values.
fn simulate_step(aig: &Aig, latches: &[bool], inputs: &[bool]) -> (bool, Vec<bool>) {
    let mut values = vec![false; aig.max_var as usize + 1];
    let eval = |values: &[bool], lit: u32| -> bool {
        if lit <= 1 {
            lit == 1
        } else {
            values[(lit >> 1) as usize] ^ (lit & 1 == 1)
        }
    };

    for (index, &value) in inputs.iter().enumerate() {
        values[index + 1] = value;
    }
    for (index, &value) in latches.iter().enumerate() {
        values[aig.num_inputs() + index + 1] = value;
    }
    for gate in aig.ands.iter() {
        values[(gate.lhs >> 1) as usize] = eval(&values, gate.rhs0) && eval(&values, gate.rhs1);
    }

    let bad = eval(&values, aig.bad_literal().unwrap());
    let next = aig
        .latches
        .iter()
        .map(|latch| eval(&values, latch.next))
        .collect();
    (bad, next)
}

/// Replays a counterexample and checks that it ends in a bad state.
fn assert_trace_reaches_bad(aig: &Aig, verdict: &Verdict) {
    let (init, inputs) = match verdict {
        Verdict::Unsafe { init, inputs } => (init.clone(), inputs.clone()),
        other => panic!("expected a counterexample, got {:?}", other),
    };

    let mut latches = init;
    for step in inputs.iter() {
        assert_eq!(step.len(), aig.num_inputs());
        let (_, next) = simulate_step(aig, &latches, step);
        latches = next;
    }
    let (bad, _) = simulate_step(aig, &latches, &vec![false; aig.num_inputs()]);
    assert!(bad, "trace does not end in a bad state");
}

#[test]
fn combinational_tautology_is_bad_at_step_zero() {
    let aig = Aig::parse_bytes(b"aag 0 0 0 1 0\n1\n").unwrap();
    for config in both_directions() {
        let verdict = check(&aig, &config).unwrap();
        match &verdict {
            Verdict::Unsafe { init, inputs } => {
                assert!(init.is_empty());
                assert!(inputs.is_empty());
            }
            other => panic!("expected a counterexample, got {:?}", other),
        }
        assert_trace_reaches_bad(&aig, &verdict);
    }
}

#[test]
fn toggle_latch_fails_after_one_step() {
    // One latch initialized to zero with next = !latch, bad when high.
    let aig = Aig::parse_bytes(b"aag 1 0 1 1 0\n2 3\n2\n").unwrap();
    for config in both_directions() {
        let verdict = check(&aig, &config).unwrap();
        match &verdict {
            Verdict::Unsafe { init, inputs } => {
                assert_eq!(init, &vec![false]);
                assert_eq!(inputs.len(), 1, "the counterexample has one step");
                assert!(inputs[0].is_empty(), "the circuit has no inputs");
            }
            other => panic!("expected a counterexample, got {:?}", other),
        }
        assert_trace_reaches_bad(&aig, &verdict);
    }
}

#[test]
fn contradictory_bad_output_is_vacuously_safe() {
    // Same toggle latch, but bad = latch & !latch.
    let aig = Aig::parse_bytes(b"aag 2 0 1 1 1\n2 3\n4\n4 3 2\n").unwrap();
    for config in both_directions() {
        match check(&aig, &config).unwrap() {
            Verdict::Safe { invariant } => assert!(invariant.is_empty()),
            other => panic!("expected safe, got {:?}", other),
        }
    }
}

#[test]
fn shared_next_latches_never_diverge() {
    // Both latches latch input 1, reset to zero; bad is their xor. The
    // co-next equivalence makes the bad region unreachable outright.
    let aig = Aig::parse_bytes(
        b"aag 7 1 2 1 4\n2\n4 2\n6 2\n14\n8 4 7\n10 5 6\n12 9 11\n14 13 13\n",
    )
    .unwrap();
    for config in both_directions() {
        assert!(check(&aig, &config).unwrap().is_safe());
    }
}

#[test]
fn parity_machine_keeps_one_latch_low() {
    // l1' = input, l2' = !input, l3' = l3; bad when all three are high.
    // After the first transition l1 and l2 always differ.
    let aig =
        Aig::parse_bytes(b"aag 6 1 3 1 2\n2\n4 2\n6 3\n8 8\n12\n10 4 6\n12 10 8\n").unwrap();

    // Backward: the invariant frame must exclude the all-high state.
    match check(&aig, &config(Direction::Backward)).unwrap() {
        Verdict::Safe { invariant } => {
            assert!(!invariant.is_empty());
            let all_high = [2, 3, 4];
            assert!(
                invariant.iter().any(|cube| cube
                    .iter()
                    .all(|lit| lit.is_positive() && all_high.contains(&lit.var()))),
                "no invariant cube excludes the all-high state: {:?}",
                invariant
            );
        }
        other => panic!("expected safe, got {:?}", other),
    }

    assert!(check(&aig, &config(Direction::Forward)).unwrap().is_safe());
}

#[test]
fn shift_register_fails_at_depth_five() {
    // Five-stage shift register fed by the input, bad when bit five is high.
    let aig = Aig::parse_bytes(b"aag 6 1 5 1 0\n2\n4 2\n6 4\n8 6\n10 8\n12 10\n12\n").unwrap();
    for config in both_directions() {
        let verdict = check(&aig, &config).unwrap();
        match &verdict {
            Verdict::Unsafe { init, inputs } => {
                assert_eq!(init, &vec![false; 5]);
                assert_eq!(inputs.len(), 5, "the shortest counterexample has five steps");
                assert!(inputs[0][0], "the first step must feed a one into bit one");
            }
            other => panic!("expected a counterexample, got {:?}", other),
        }
        assert_trace_reaches_bad(&aig, &verdict);
    }
}

#[test]
fn heuristics_do_not_change_verdicts() {
    let safe = Aig::parse_bytes(b"aag 6 1 3 1 2\n2\n4 2\n6 3\n8 8\n12\n10 4 6\n12 10 8\n").unwrap();
    let unsafe_aig =
        Aig::parse_bytes(b"aag 6 1 5 1 0\n2\n4 2\n6 4\n8 6\n10 8\n12 10\n12\n").unwrap();

    for &rotate in &[false, true] {
        for &mom in &[false, true] {
            let config = SearchConfig {
                direction: Direction::Backward,
                rotate,
                mom,
            };
            assert!(check(&safe, &config).unwrap().is_safe());
            let verdict = check(&unsafe_aig, &config).unwrap();
            assert!(verdict.is_unsafe());
            assert_trace_reaches_bad(&unsafe_aig, &verdict);
        }
    }
}

#[test]
fn constraints_restrict_the_runs() {
    // bad = input, but a constraint pins the input low.
    let aig = Aig::parse_bytes(b"aag 1 1 0 1 0 0 1\n2\n2\n3\n").unwrap();
    for config in both_directions() {
        assert!(check(&aig, &config).unwrap().is_safe());
    }
}

#[test]
fn opposite_polarity_trackers_stay_safe() {
    // l1' = input, l2' = !input, bad = l1 & l2: unreachable because the
    // latches always disagree after the first step.
    let aig = Aig::parse_bytes(b"aag 4 1 2 1 1\n2\n4 2\n6 3\n8\n8 4 6\n").unwrap();
    for config in both_directions() {
        assert!(check(&aig, &config).unwrap().is_safe());
    }
}

#[test]
fn unsupported_reset_is_an_input_error() {
    // The second latch resets to itself (uninitialized).
    let aig = Aig::parse_bytes(b"aag 2 0 2 1 0\n2 3 1\n4 2 4\n2\n").unwrap();
    match check(&aig, &config(Direction::Backward)) {
        Err(ModelError::UnsupportedReset { .. }) => (),
        other => panic!("expected a reset error, got {:?}", other.err()),
    }
}

#[test]
fn witness_file_roundtrip() {
    use std::io::Write;

    let aig = Aig::parse_bytes(b"aag 6 1 5 1 0\n2\n4 2\n6 4\n8 6\n10 8\n12 10\n12\n").unwrap();
    let verdict = check(&aig, &config(Direction::Backward)).unwrap();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    let mut buffer = vec![];
    caracal::write_witness(&verdict, &mut buffer).unwrap();
    file.write_all(&buffer).unwrap();

    let text = std::fs::read_to_string(file.path()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "1");
    assert_eq!(lines[1], "b0");
    assert_eq!(lines[2], "00000");
    assert_eq!(lines.len(), 3 + 5 + 1);
    assert_eq!(*lines.last().unwrap(), ".");
}
