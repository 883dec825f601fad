use super::*;
use crate::context::GlobalContext;
use crate::key::Mode;
use crate::pitch::parse_pitch_class;
use crate::score::Score;
use crate::test_helpers::{score_from_measures, two_parts};

fn check(score: Score) -> Vec<Violation> {
    let ctx = GlobalContext::new(score, None, None).unwrap();
    check_counterpoint(&ctx)
}

/// Tiny examples can be tonally ambiguous; pin the key to C major.
fn check_in_c(score: Score) -> Vec<Violation> {
    let ctx = GlobalContext::new(
        score,
        Some(parse_pitch_class("C").unwrap()),
        Some(Mode::Major),
    )
    .unwrap();
    check_counterpoint(&ctx)
}

#[test]
fn test_clean_first_species() {
    // Scenario: C D E D C over C G C reports no violations.
    let score = two_parts(&["C4", "D4", "E4", "D4", "C4"], &["C3", "G3", "C3"]);
    let violations = check(score);
    assert!(violations.is_empty(), "unexpected: {violations:?}");
}

#[test]
fn test_parallel_fifths() {
    // Two upper voices moving C-D and G-A over a static bass.
    let score = score_from_measures(vec![
        vec![vec!["G4"], vec!["A4"], vec!["G4"]],
        vec![vec!["C4"], vec!["D4"], vec!["C4"]],
        vec![vec!["C3"], vec!["C3"], vec!["C3"]],
    ]);
    let violations = check(score);
    let fifths: Vec<_> = violations
        .iter()
        .filter(|v| v.message.contains("parallel motion to fifth"))
        .collect();
    assert!(!fifths.is_empty());
    assert_eq!(fifths[0].parts, vec![0, 1]);
    assert_eq!(fifths[0].measures, vec![2]);
    assert!(fifths[0].message.contains("going into bar 2"));
}

#[test]
fn test_parallel_octaves() {
    let score = two_parts(&["C4", "D4", "C4"], &["C3", "D3", "C3"]);
    let violations = check_in_c(score);
    assert!(
        violations
            .iter()
            .any(|v| v.message.contains("Forbidden parallel motion to octave going into bar 2."))
    );
}

#[test]
fn test_similar_motion_to_fifth_with_leap() {
    // Both voices rise; the upper leaps into the fifth.
    let score = two_parts(&["E4", "A4", "G4", "E4"], &["C3", "D3", "E3", "C3"]);
    let violations = check(score);
    assert!(
        violations
            .iter()
            .any(|v| v.message.contains("Forbidden similar motion to fifth going into bar 2."))
    );
}

#[test]
fn test_onbeat_dissonance() {
    let score = two_parts(&["C4", "D4", "C4"], &["C3", "C3", "C3"]);
    let violations = check_in_c(score);
    assert!(
        violations
            .iter()
            .any(|v| v.message.contains("Dissonance between co-initiated notes in bar 2: M2."))
    );
}

#[test]
fn test_second_species_passing_dissonance_allowed() {
    // The offbeat D passes between C and E: no finding.
    let score = score_from_measures(vec![
        vec![vec!["C4", "D4"], vec!["E4", "D4"], vec!["C4"]],
        vec![vec!["C3"], vec!["G3"], vec!["C3"]],
    ]);
    let violations = check(score);
    assert!(
        violations.is_empty(),
        "passing tones should be permitted: {violations:?}"
    );
}

#[test]
fn test_second_species_offbeat_leap_dissonance() {
    // The offbeat B is left by leap: dissonant against the bass C.
    let score = score_from_measures(vec![
        vec![vec!["C4", "B3"], vec!["E4", "D4"], vec!["C4"]],
        vec![vec!["C3"], vec!["G3"], vec!["C3"]],
    ]);
    let violations = check(score);
    assert!(violations.iter().any(|v| {
        v.message
            .contains("Dissonant interval off the beat that is not approached and left by step")
    }));
}

#[test]
fn test_voice_crossing() {
    let score = two_parts(&["C4", "E3", "C4"], &["C3", "G3", "C3"]);
    let violations = check(score);
    assert!(
        violations
            .iter()
            .any(|v| v.message.contains("Voice crossing in bar 2."))
    );
}

#[test]
fn test_direct_repetition_in_second_species() {
    let score = score_from_measures(vec![
        vec![vec!["C4", "C4"], vec!["E4", "D4"], vec!["C4"]],
        vec![vec!["C3"], vec!["G3"], vec!["C3"]],
    ]);
    let violations = check(score);
    assert!(
        violations
            .iter()
            .any(|v| v.message.contains("Direct repetition in bar 1."))
    );
}

#[test]
fn test_fourth_species_suspension() {
    // 7-6 suspensions resolve down by step: clean.
    let src = r#"{
        "parts": [
            {"measures": [
                [{"pitch": "E4", "duration": 2}, {"pitch": "E4", "duration": 2, "tied": true}],
                [{"pitch": "E4", "duration": 2}, {"pitch": "D4", "duration": 2, "tied": true}],
                [{"pitch": "D4", "duration": 2}, {"pitch": "C4", "duration": 2, "tied": true}],
                [{"pitch": "C4", "duration": 4}]
            ]},
            {"measures": [
                [{"pitch": "C3", "duration": 4}],
                [{"pitch": "F3", "duration": 4}],
                [{"pitch": "E3", "duration": 4}],
                [{"pitch": "C3", "duration": 4}]
            ]}
        ]
    }"#;
    let score = Score::from_json(src).unwrap();
    let ctx = GlobalContext::new(
        score,
        Some(parse_pitch_class("C").unwrap()),
        Some(Mode::Major),
    )
    .unwrap();
    let violations = check_counterpoint(&ctx);
    assert!(violations.is_empty(), "unexpected: {violations:?}");
}

#[test]
fn test_fourth_species_unresolved_suspension() {
    // The tied-over second leaps away instead of falling by step.
    let src = r#"{
        "parts": [
            {"measures": [
                [{"pitch": "E4", "duration": 2}, {"pitch": "D4", "duration": 2, "tied": true}],
                [{"pitch": "D4", "duration": 2}, {"pitch": "G4", "duration": 2}],
                [{"pitch": "E4", "duration": 4}]
            ]},
            {"measures": [
                [{"pitch": "C3", "duration": 4}],
                [{"pitch": "C3", "duration": 4}],
                [{"pitch": "C3", "duration": 4}]
            ]}
        ]
    }"#;
    let score = Score::from_json(src).unwrap();
    let ctx = GlobalContext::new(
        score,
        Some(parse_pitch_class("C").unwrap()),
        Some(Mode::Major),
    )
    .unwrap();
    let violations = check_counterpoint(&ctx);
    assert!(violations.iter().any(|v| {
        v.message.contains("is not resolved by downward step")
    }));
}

#[test]
fn test_monotone_in_input() {
    // Adding a third part never removes findings from the original
    // pair.
    let upper = ["C4", "D4", "C4"];
    let lower = ["C3", "D3", "C3"];
    let base = check_in_c(two_parts(&upper, &lower));
    let extended = check_in_c(score_from_measures(vec![
        vec![vec!["E5"], vec!["F5"], vec!["E5"]],
        upper.iter().map(|n| vec![*n]).collect(),
        lower.iter().map(|n| vec![*n]).collect(),
    ]));
    for v in &base {
        let shifted: Vec<usize> = v.parts.iter().map(|p| p + 1).collect();
        assert!(
            extended
                .iter()
                .any(|w| w.message == v.message && w.parts == shifted),
            "missing finding: {v:?}"
        );
    }
}
