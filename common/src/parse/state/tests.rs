use super::*;
use crate::context::GlobalContext;
use crate::key::Mode;
use crate::parse::Line;
use crate::parse::arc::ArcKind;
use crate::pitch::parse_pitch_class;
use crate::test_helpers::first_species;

fn scan_ctx(ctx: &GlobalContext) -> Result<Vec<ScanState>, Vec<ScanError>> {
    let pc = &ctx.parts[0];
    let line = Line {
        events: pc.events(),
        csds: &pc.csds,
        species: pc.species(),
        harmonies: &ctx.local_harmonies,
    };
    scan(&line)
}

fn scan_line(notes: &[&str]) -> Result<Vec<ScanState>, Vec<ScanError>> {
    let ctx = GlobalContext::new(first_species(notes), None, None).unwrap();
    scan_ctx(&ctx)
}

fn scan_line_in(notes: &[&str], keynote: &str, mode: Mode) -> Result<Vec<ScanState>, Vec<ScanError>> {
    let ctx = GlobalContext::new(
        first_species(notes),
        Some(parse_pitch_class(keynote).unwrap()),
        Some(mode),
    )
    .unwrap();
    scan_ctx(&ctx)
}

fn arcs_of(st: &ScanState) -> Vec<(ArcKind, Vec<usize>)> {
    st.arcs
        .iter()
        .map(|a| (a.kind, a.indices.clone()))
        .collect()
}

#[test]
fn test_passing_arc() {
    let states = scan_line(&["C4", "D4", "E4", "C4"]).unwrap();
    let st = &states[0];
    assert!(arcs_of(st).contains(&(ArcKind::Passing, vec![0, 1, 2])));
    assert!(st.transitions.is_empty());
    assert_eq!(st.deps[1].lefthead, Some(0));
    assert_eq!(st.deps[1].righthead, Some(2));
}

#[test]
fn test_neighbor_arc() {
    let states = scan_line(&["E4", "F4", "E4", "D4", "C4"]).unwrap();
    let st = &states[0];
    assert!(arcs_of(st).contains(&(ArcKind::Neighbor, vec![0, 1, 2])));
}

#[test]
fn test_long_passing_chain() {
    // G up to C: two nonharmonic tones in a row share one arc.
    let states = scan_line(&["G4", "A4", "B4", "C5", "C5", "G4", "C5"]).unwrap();
    let st = &states[0];
    assert!(arcs_of(st).contains(&(ArcKind::Passing, vec![0, 1, 2, 3])));
    assert!(arcs_of(st).contains(&(ArcKind::Repetition, vec![3, 4])));
}

#[test]
fn test_repetition_and_arpeggiation() {
    let states = scan_line(&["C4", "C4", "E4", "G4", "C4"]).unwrap();
    let st = &states[0];
    assert!(arcs_of(st).contains(&(ArcKind::Repetition, vec![0, 1])));
    assert!(arcs_of(st).contains(&(ArcKind::Arpeggiation, vec![1, 2])));
    assert!(arcs_of(st).contains(&(ArcKind::Arpeggiation, vec![2, 3])));
}

#[test]
fn test_register_transfer() {
    let states = scan_line(&["C4", "C5", "B4", "A4", "G4", "F4", "E4", "D4", "C4"]).unwrap();
    let st = &states[0];
    let transfers: Vec<_> = st
        .arcs
        .iter()
        .filter(|a| a.kind == ArcKind::Transfer)
        .collect();
    assert_eq!(transfers.len(), 1);
    assert!(transfers[0].dashed);
    assert_eq!(transfers[0].indices, vec![0, 1]);
}

#[test]
fn test_nongenerable_pitch() {
    // A 6th degree approached by leap hangs from no step-related head.
    let errors = scan_line_in(&["C4", "A4", "B4", "C5"], "C", Mode::Major).unwrap_err();
    assert!(
        errors[0]
            .message
            .contains("The non-tonic-triad pitch A4 in measure 2 cannot be generated.")
    );
}

#[test]
fn test_leap_too_large() {
    let errors = scan_line(&["C4", "E5", "D5", "C5"]).unwrap_err();
    assert!(errors[0].message.contains("Leap larger than an octave"));
}

#[test]
fn test_dissonant_leap() {
    let errors = scan_line(&["C4", "B4", "C5", "C5"]).unwrap_err();
    assert!(errors[0].message.contains("Nongenerable leap between C4 and B4"));
}

#[test]
fn test_repetition_of_nontriadic_pitch() {
    let errors = scan_line(&["C4", "D4", "D4", "C4"]).unwrap_err();
    assert!(
        errors[0]
            .message
            .contains("Repetition of a non-tonic-triad pitch: D4 in measure 3.")
    );
}

#[test]
fn test_fork_on_skip_resolution() {
    // After C-D-E the E resolves the D; after the skip E-G the G could
    // not also resolve it, so exactly one hearing survives per branch
    // point and duplicates coalesce.
    let states = scan_line(&["C4", "D4", "E4", "G4", "E4", "D4", "C4"]).unwrap();
    assert!(!states.is_empty());
    for st in &states {
        assert!(st.transitions.is_empty());
    }
}

#[test]
fn test_determinism() {
    let a = scan_line(&["D4", "E4", "F4", "D4", "E4", "F4", "G4", "F4", "E4", "D4"]).unwrap();
    let b = scan_line(&["D4", "E4", "F4", "D4", "E4", "F4", "G4", "F4", "E4", "D4"]).unwrap();
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(x.arcs, y.arcs);
    }
}
