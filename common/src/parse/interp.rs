//! Line-type completion: turn surviving scan states into
//! interpretations. A completion pass verifies the boundary conditions
//! of the requested line type, searches for its basic structure (the
//! fundamental descent of a primary line, the tonic-dominant-tonic
//! arpeggiation of a bass, the tonic frame of a generic line), labels
//! every event with the rule that generated it, and applies the
//! preference rules that weed out unpreferred hearings.

use super::arc::{Arc, ArcKind, is_arc_terminal, is_covered, is_passing_shape};
use super::rule::RuleLabel;
use super::state::{ScanState, scan};
use super::{Line, LineType};
use crate::context::GlobalContext;
use crate::diagnostics::{Diagnostics, code};
use crate::pitch::Interval;
use log::debug;

/// Cap on distinct basic-structure chains explored per head candidate.
const CHAIN_CAP: usize = 64;

#[derive(Debug, Clone)]
pub struct Interpretation {
    pub line_type: LineType,
    /// Sorted by (left endpoint, right endpoint).
    pub arcs: Vec<Arc>,
    /// One rule label per event.
    pub labels: Vec<RuleLabel>,
    /// Events to be shown in parentheses (insertions).
    pub parens: Vec<bool>,
    /// The head of the basic structure (S1).
    pub s1: usize,
    /// The structural dominant (S3), absent for generic lines.
    pub s3: Option<usize>,
    /// The closing event (S2).
    pub final_index: usize,
}

/// Knobs for the preference rules. Defaults reproduce the standard
/// behavior; ranking beyond these is deliberately not hard-coded.
#[derive(Debug, Clone)]
pub struct Preferences {
    /// Among primary parses with the same head degree, keep only the
    /// earliest head.
    pub earliest_head: bool,
    /// Prefer bass parses whose S3 falls past the midpoint of the line.
    pub bass_s3_past_midpoint: bool,
    /// Prefer bass parses whose S3 falls on a downbeat.
    pub bass_s3_onbeat: bool,
    /// When two adjacent S3 candidates form a repetition, prefer the
    /// first.
    pub bass_s3_repetition: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Preferences {
            earliest_head: true,
            bass_s3_past_midpoint: true,
            bass_s3_onbeat: true,
            bass_s3_repetition: true,
        }
    }
}

#[derive(Debug, Default)]
pub struct PartAnalysis {
    pub part_index: usize,
    pub attempted: Vec<LineType>,
    pub primary: Vec<Interpretation>,
    pub bass: Vec<Interpretation>,
    pub generic: Vec<Interpretation>,
    pub errors: Diagnostics,
}

impl PartAnalysis {
    pub fn is_primary(&self) -> bool {
        !self.primary.is_empty()
    }

    pub fn is_bass(&self) -> bool {
        !self.bass.is_empty()
    }

    pub fn is_generic(&self) -> bool {
        !self.generic.is_empty()
    }

    pub fn interpretations(&self, line_type: LineType) -> &[Interpretation] {
        match line_type {
            LineType::Primary => &self.primary,
            LineType::Bass => &self.bass,
            LineType::Generic => &self.generic,
        }
    }

    pub fn all(&self) -> impl Iterator<Item = &Interpretation> {
        self.primary
            .iter()
            .chain(self.bass.iter())
            .chain(self.generic.iter())
    }
}

/// Parse one part of the context for the requested line type, or for
/// every plausible type when none is requested.
pub fn parse_part(
    ctx: &GlobalContext,
    part_index: usize,
    requested: Option<LineType>,
    prefs: &Preferences,
) -> PartAnalysis {
    let pc = &ctx.parts[part_index];
    let line = Line {
        events: pc.events(),
        csds: &pc.csds,
        species: pc.species(),
        harmonies: &ctx.local_harmonies,
    };
    let mut analysis = PartAnalysis {
        part_index,
        ..Default::default()
    };

    if line.len() < 2 {
        analysis.errors.err(
            code::LINE,
            line.events.first().map(|e| e.measure),
            "The line contains too few notes to form a basic structure.",
        );
        return analysis;
    }

    let lowest = part_index + 1 == ctx.parts.len();
    let single = ctx.parts.len() == 1;
    analysis.attempted = match requested {
        Some(t) => vec![t],
        None => infer_line_types(&line, single, lowest, &analysis.errors),
    };
    if analysis.attempted.is_empty() {
        return analysis;
    }

    let states = match scan(&line) {
        Ok(states) => states,
        Err(errors) => {
            for e in errors {
                analysis
                    .errors
                    .err(code::LINE, Some(line.events[e.index].measure), e.message);
            }
            return analysis;
        }
    };
    debug!(
        "part {}: {} scan state(s), line types {:?}",
        part_index + 1,
        states.len(),
        analysis.attempted
    );

    for line_type in analysis.attempted.clone() {
        let mut interps = Vec::new();
        for st in &states {
            let found = match line_type {
                LineType::Primary => complete_primary(&line, st, &analysis.errors),
                LineType::Bass => complete_bass(&line, st, &analysis.errors),
                LineType::Generic => complete_generic(&line, st, &analysis.errors),
            };
            interps.extend(found);
        }
        dedupe(&mut interps);
        apply_preferences(&line, line_type, &mut interps, prefs);
        match line_type {
            LineType::Primary => analysis.primary = interps,
            LineType::Bass => analysis.bass = interps,
            LineType::Generic => analysis.generic = interps,
        }
    }
    analysis
}

/// Infer the set of plausible line types for an unconstrained part.
fn infer_line_types(
    line: &Line,
    single: bool,
    lowest: bool,
    errors: &Diagnostics,
) -> Vec<LineType> {
    let n = line.len();
    let first_triad = line.csds[0].is_triad_member();
    let last_triad = line.csds[n - 1].is_triad_member();
    if !first_triad && !last_triad {
        errors.err(
            code::STRUCTURE,
            Some(line.events[0].measure),
            "Generic structure error: The line is not bounded by tonic-triad \
             pitches and hence not a valid tonic line.",
        );
        return Vec::new();
    }
    let mut types = Vec::new();
    let t = line.value(n - 1);
    let upper_ok = single || !lowest;
    let has_head = (0..n - 1).any(|i| {
        let v = line.value(i);
        [t + 1, t + 2, t + 4, t + 7].contains(&v) || (t >= 7 && v == t - 7)
    });
    if first_triad && t.rem_euclid(7) == 0 && upper_ok && has_head {
        types.push(LineType::Primary);
    }
    if line.value(0).rem_euclid(7) == 0
        && t.rem_euclid(7) == 0
        && (single || lowest)
        && (1..n - 1).any(|i| line.value(i).rem_euclid(7) == 4)
    {
        types.push(LineType::Bass);
    }
    if first_triad && last_triad {
        types.push(LineType::Generic);
    }
    types
}

/// Whether an event can serve as a structural tone: it must not be a
/// closed dependent and no arc may span it from outside.
fn eligible(i: usize, st: &ScanState) -> bool {
    let free = st.deps[i].lefthead.is_none() && st.deps[i].righthead.is_none();
    (free || is_arc_terminal(i, &st.arcs)) && !is_covered(i, &st.arcs)
}

/// One candidate basic structure found by the chain search.
#[derive(Debug, Clone)]
struct Chain {
    /// The basic arc: head, realized interior degrees, final.
    basic: Vec<usize>,
    /// Same-degree restatements consumed along the way, as (from, to)
    /// pairs that become repetition arcs.
    reps: Vec<(usize, usize)>,
    /// Scan arcs absorbed into the basic arc.
    absorbed: Vec<Arc>,
}

/// Search for realizations of a stepwise line from `head` to `last`,
/// moving one degree per structural step in direction `dir`. A move is a
/// direct step to an eligible event, the wholesale absorption of an
/// existing passing arc, or a restatement of the current degree.
fn find_chains(line: &Line, st: &ScanState, head: usize, last: usize, dir: i32) -> Vec<Chain> {
    let mut chains = Vec::new();
    let mut stack = vec![Chain {
        basic: vec![head],
        reps: Vec::new(),
        absorbed: Vec::new(),
    }];
    while let Some(chain) = stack.pop() {
        if chains.len() >= CHAIN_CAP {
            break;
        }
        // The current position: moves only ever advance rightward, so it
        // is the rightmost index reached by a step, absorption, or
        // restatement.
        let c = (*chain.basic.last().unwrap()).max(chain.reps.last().map(|r| r.1).unwrap_or(0));
        if c == last {
            chains.push(chain);
            continue;
        }
        let v = line.value(c);
        // Absorb a passing arc moving in our direction.
        for a in &st.arcs {
            if a.kind == ArcKind::Passing
                && a.first() == c
                && a.last() <= last
                && is_passing_shape(&a.indices, line.csds)
                && (line.value(a.indices[1]) - v) == dir
                && (a.last() < last || line.value(a.last()) == line.value(last))
            {
                let mut next = chain.clone();
                next.basic.extend(a.interior());
                next.basic.push(a.last());
                next.absorbed.push(a.clone());
                stack.push(next);
            }
        }
        // A direct structural step.
        for s in c + 1..=last {
            if line.value(s) == v + dir && (eligible(s, st) || s == last) && !is_covered(s, &st.arcs)
            {
                let mut next = chain.clone();
                next.basic.push(s);
                stack.push(next);
            }
        }
        // Restate the current degree and continue from the restatement.
        // A restatement that reaches the closing event makes the final
        // statement structural and the current one its anticipation.
        for r in c + 1..=last {
            if line.value(r) == v && eligible(r, st) {
                let mut next = chain.clone();
                if r == last {
                    let anticipated = next.basic.pop().unwrap();
                    next.basic.push(last);
                    next.reps.push((anticipated, last));
                } else {
                    next.reps.push((c, r));
                }
                stack.push(next);
            }
        }
    }
    chains
}

/// Order S3 candidates by preference: the dominant degree itself first,
/// then its fifth, then its third; later events first within a degree.
fn order_s3_pool(line: &Line, pool: &mut Vec<usize>) {
    let rank = |i: &usize| match line.value(*i).rem_euclid(7) {
        4 => 0,
        1 => 1,
        6 => 2,
        _ => 3,
    };
    pool.sort_by_key(|i| (rank(i), std::cmp::Reverse(*i)));
}

fn complete_primary(line: &Line, st: &ScanState, errors: &Diagnostics) -> Vec<Interpretation> {
    let n = line.len();
    let last = n - 1;
    let t = line.value(last);
    if t.rem_euclid(7) != 0 {
        errors.err(
            code::STRUCTURE,
            Some(line.events[last].measure),
            "Primary structure error: The line does not end on the tonic degree (S2).",
        );
        return Vec::new();
    }

    // Heads a 2nd, 3rd, 5th, or octave above the closing tonic; when the
    // line closes on the upper octave, the tonic an octave below may
    // head an ascending octave line.
    let mut candidates: Vec<(usize, i32)> = Vec::new();
    for h in 0..last {
        let v = line.value(h);
        if !eligible(h, st) {
            continue;
        }
        if [t + 1, t + 2, t + 4, t + 7].contains(&v) {
            candidates.push((h, -1));
        } else if t >= 7 && v == t - 7 {
            candidates.push((h, 1));
        }
    }
    if candidates.is_empty() {
        errors.err(
            code::STRUCTURE,
            Some(line.events[0].measure),
            "Primary structure error: No candidate for S1 detected.",
        );
        return Vec::new();
    }

    let mut out = Vec::new();
    for (head, dir) in candidates {
        let chains = find_chains(line, st, head, last, dir);
        if chains.is_empty() {
            let degree = if dir > 0 {
                8
            } else {
                line.csds[head].degree()
            };
            errors.err(
                code::STRUCTURE,
                Some(line.events[head].measure),
                format!("No basic step motion found from this S1 candidate: {degree}."),
            );
            continue;
        }
        for chain in chains {
            // Candidates for the structural dominant: dominant-triad
            // degrees realized inside the descent, or failing that,
            // free dominant-degree events under the head's span.
            let mut pool: Vec<usize> = chain.basic[1..chain.basic.len() - 1]
                .iter()
                .copied()
                .filter(|&i| matches!(line.value(i).rem_euclid(7), 4 | 1 | 6))
                .collect();
            if pool.is_empty() {
                pool = (head + 1..last)
                    .filter(|&i| {
                        matches!(line.value(i).rem_euclid(7), 4 | 1 | 6)
                            && eligible(i, st)
                            && !chain.basic.contains(&i)
                    })
                    .collect();
            }
            if pool.is_empty() {
                errors.err(
                    code::STRUCTURE,
                    Some(line.events[head].measure),
                    "Primary structure error: No candidate for S3 detected.",
                );
                continue;
            }
            order_s3_pool(line, &mut pool);
            for s3 in pool {
                if let Some(interp) =
                    build_interpretation(line, st, LineType::Primary, &chain, Some(s3), errors)
                {
                    out.push(interp);
                }
            }
        }
    }
    out
}

fn complete_bass(line: &Line, st: &ScanState, errors: &Diagnostics) -> Vec<Interpretation> {
    let n = line.len();
    let last = n - 1;
    let mut structure_ok = true;
    if line.value(0).rem_euclid(7) != 0 {
        errors.err(
            code::STRUCTURE,
            Some(line.events[0].measure),
            "Bass structure error: The line does not begin on the tonic degree (S1).",
        );
        structure_ok = false;
    }
    if line.value(last).rem_euclid(7) != 0 {
        errors.err(
            code::STRUCTURE,
            Some(line.events[last].measure),
            "Bass structure error: The line does not end on the tonic degree (S2).",
        );
        structure_ok = false;
    }
    if !structure_ok {
        return Vec::new();
    }
    let s3cands: Vec<usize> = (1..last)
        .filter(|&i| line.value(i).rem_euclid(7) == 4 && eligible(i, st))
        .collect();
    if s3cands.is_empty() {
        errors.err(
            code::STRUCTURE,
            Some(line.events[0].measure),
            "Bass structure error: No candidate for S3 detected.",
        );
        return Vec::new();
    }
    let mut out = Vec::new();
    for s3 in s3cands {
        let chain = Chain {
            basic: vec![0, s3, last],
            reps: Vec::new(),
            absorbed: Vec::new(),
        };
        if let Some(interp) =
            build_interpretation(line, st, LineType::Bass, &chain, Some(s3), errors)
        {
            out.push(interp);
        }
    }
    out
}

fn complete_generic(line: &Line, st: &ScanState, errors: &Diagnostics) -> Vec<Interpretation> {
    let n = line.len();
    let last = n - 1;
    if !line.csds[0].is_triad_member() || !line.csds[last].is_triad_member() {
        errors.err(
            code::STRUCTURE,
            Some(line.events[0].measure),
            "Generic structure error: The line is not bounded by tonic-triad \
             pitches and hence not a valid tonic line.",
        );
        return Vec::new();
    }
    // The tonic frame: a same-degree pair, or an existing step motion
    // connecting the terminals; a generic line may also stand without
    // any basic arc.
    let chain = if line.value(0) == line.value(last) {
        Chain {
            basic: vec![0, last],
            reps: Vec::new(),
            absorbed: Vec::new(),
        }
    } else if let Some(a) = st
        .arcs
        .iter()
        .find(|a| a.kind == ArcKind::Passing && a.first() == 0 && a.last() == last)
    {
        Chain {
            basic: a.indices.clone(),
            reps: Vec::new(),
            absorbed: vec![a.clone()],
        }
    } else {
        Chain {
            basic: Vec::new(),
            reps: Vec::new(),
            absorbed: Vec::new(),
        }
    };
    build_interpretation(line, st, LineType::Generic, &chain, None, errors)
        .into_iter()
        .collect()
}

/// Assemble the full interpretation for one basic-structure chain:
/// rebuild the arc set, assign the structural labels, derive the
/// secondary labels from the dependency links, and validate that every
/// event is generated by exactly one rule.
fn build_interpretation(
    line: &Line,
    st: &ScanState,
    line_type: LineType,
    chain: &Chain,
    s3: Option<usize>,
    errors: &Diagnostics,
) -> Option<Interpretation> {
    let n = line.len();
    let last = n - 1;
    let mut arcs: Vec<Arc> = st
        .arcs
        .iter()
        .filter(|a| !chain.absorbed.iter().any(|b| b == *a))
        .cloned()
        .collect();

    let basic = if chain.basic.is_empty() {
        None
    } else {
        Some(Arc::new(ArcKind::Basic, chain.basic.clone()))
    };
    if let Some(b) = &basic {
        // A basic arc must not cross what the scan already committed to.
        if arcs.iter().any(|a| a.kind != ArcKind::Transfer && b.crosses(a)) {
            return None;
        }
        arcs.push(b.clone());
    }
    // Restatements become repetition arcs from the tone they restate.
    for &(f, r) in &chain.reps {
        arcs.push(Arc::new(ArcKind::Repetition, vec![f, r]));
    }
    arcs.sort_by_key(|a| (a.first(), a.last()));
    arcs.dedup();

    let mut labels: Vec<Option<RuleLabel>> = vec![None; n];
    if let Some(b) = &basic {
        labels[b.first()] = Some(RuleLabel::S1);
        labels[b.last()] = Some(RuleLabel::S2);
        for &i in b.interior() {
            labels[i] = Some(RuleLabel::E4);
        }
    } else {
        labels[0] = Some(RuleLabel::S1);
        labels[last] = Some(RuleLabel::S2);
    }
    if let Some(s3) = s3 {
        labels[s3] = Some(RuleLabel::S3);
    }
    for &(_, r) in &chain.reps {
        if labels[r].is_none() {
            labels[r] = Some(RuleLabel::E1);
        }
    }

    // An immediate restatement of the closing tonic is an anticipation.
    for a in arcs.iter_mut() {
        if a.kind == ArcKind::Repetition
            && a.last() == last
            && a.first() + 1 == last
            && labels[a.first()].is_none()
        {
            a.kind = ArcKind::Anticipation;
            labels[a.first()] = Some(RuleLabel::E5);
        }
        if a.kind == ArcKind::Transfer && labels[a.last()].is_none() {
            labels[a.last()] = Some(RuleLabel::E6);
        }
    }

    if !assign_secondary(line, st, &mut labels, errors) {
        return None;
    }

    let mut parens = vec![false; n];
    for i in 0..n {
        match labels[i] {
            Some(RuleLabel::E3) if st.deps[i].dependents.is_empty() => parens[i] = true,
            Some(RuleLabel::L3) => parens[i] = true,
            _ => {}
        }
    }

    if !local_resolutions_ok(line, &labels, errors) {
        return None;
    }

    let s1 = basic.as_ref().map(|b| b.first()).unwrap_or(0);
    Some(Interpretation {
        line_type,
        arcs,
        labels: labels.into_iter().map(|l| l.unwrap()).collect(),
        parens,
        s1,
        s3,
        final_index: last,
    })
}

/// Label every still-unlabeled event from its dependency links; returns
/// false when some event cannot be generated by any rule.
fn assign_secondary(
    line: &Line,
    st: &ScanState,
    labels: &mut [Option<RuleLabel>],
    errors: &Diagnostics,
) -> bool {
    let florid = line.is_florid();
    for i in 0..line.len() {
        if labels[i].is_some() {
            continue;
        }
        if line.events[i].tied_from_prev {
            labels[i] = Some(RuleLabel::E1);
            continue;
        }
        let triad_i = line.csds[i].is_triad_member();
        match (st.deps[i].lefthead, st.deps[i].righthead) {
            (Some(l), Some(r)) => {
                if line.value(l) == line.value(r) {
                    // A neighbor; its closing head restates the opening
                    // one.
                    if line.csds[r].is_triad_member() {
                        labels[i] = Some(RuleLabel::E2);
                        if labels[r].is_none() {
                            labels[r] = Some(RuleLabel::E1);
                        }
                    } else {
                        labels[i] = Some(RuleLabel::L2);
                        if labels[r].is_none() {
                            labels[r] = Some(RuleLabel::L1);
                        }
                    }
                } else {
                    labels[i] = Some(RuleLabel::E4);
                    if labels[r].is_none() && line.csds[r].is_triad_member() {
                        labels[r] = Some(RuleLabel::E3);
                    }
                }
            }
            (Some(l), None) if line.value(l) == line.value(i) => {
                labels[i] = Some(if triad_i { RuleLabel::E1 } else { RuleLabel::L1 });
            }
            _ => {}
        }
        if labels[i].is_some() {
            continue;
        }
        if triad_i {
            labels[i] = Some(RuleLabel::E3);
        } else if florid && st.locals.contains(&i) {
            labels[i] = Some(RuleLabel::L3);
        } else {
            let (p, m) = line.place(i);
            errors.err(
                code::LINE,
                Some(m),
                format!("The pitch {p} in measure {m} is not generable."),
            );
            return false;
        }
    }
    true
}

/// Every local insertion must be displaced by step to a triad pitch
/// somewhere later in the line.
fn local_resolutions_ok(line: &Line, labels: &[Option<RuleLabel>], errors: &Diagnostics) -> bool {
    let mut ok = true;
    for i in 0..line.len() {
        if labels[i] != Some(RuleLabel::L3) {
            continue;
        }
        let resolved = (i + 1..line.len()).any(|r| {
            line.csds[r].is_triad_member()
                && Interval::between(line.events[i].pitch, line.events[r].pitch).is_step()
        });
        if !resolved {
            let (p, m) = line.place(i);
            errors.err(
                code::LINE,
                Some(m),
                format!(
                    "The local insertion {p} in measure {m} is not displaced by \
                     step to a triad pitch."
                ),
            );
            ok = false;
        }
    }
    ok
}

/// Remove duplicate hearings: identical labelings, and for primary
/// lines identical basic arcs.
fn dedupe(interps: &mut Vec<Interpretation>) {
    let mut seen_labels: Vec<Vec<RuleLabel>> = Vec::new();
    interps.retain(|i| {
        if seen_labels.contains(&i.labels) {
            false
        } else {
            seen_labels.push(i.labels.clone());
            true
        }
    });
}

fn apply_preferences(
    line: &Line,
    line_type: LineType,
    interps: &mut Vec<Interpretation>,
    prefs: &Preferences,
) {
    match line_type {
        LineType::Primary => {
            if prefs.earliest_head {
                // For each head degree, keep the hearings with the
                // earliest head position.
                let mut earliest: Vec<(i32, usize)> = Vec::new();
                for i in interps.iter() {
                    let d = line.value(i.s1);
                    match earliest.iter_mut().find(|(v, _)| *v == d) {
                        Some((_, e)) => *e = (*e).min(i.s1),
                        None => earliest.push((d, i.s1)),
                    }
                }
                interps.retain(|i| {
                    earliest
                        .iter()
                        .any(|&(v, e)| v == line.value(i.s1) && i.s1 == e)
                });
            }
        }
        LineType::Bass => {
            // Group S3 candidates by degree value (the fifth above or
            // below the tonic), then prefer late and on-beat dominants.
            if prefs.bass_s3_past_midpoint && interps.len() > 1 {
                let midpoint = line.len() / 2;
                for value in [-3, 4] {
                    let in_group = |i: &Interpretation| {
                        i.s3.map(|s| line.value(s) == value).unwrap_or(false)
                    };
                    let late: Vec<usize> = interps
                        .iter()
                        .filter(|i| in_group(i) && i.s3.unwrap() >= midpoint)
                        .map(|i| i.s3.unwrap())
                        .collect();
                    if !late.is_empty() {
                        interps.retain(|i| !in_group(i) || late.contains(&i.s3.unwrap()));
                    }
                }
            }
            if prefs.bass_s3_onbeat && interps.len() > 1 {
                let onbeat: Vec<usize> = interps
                    .iter()
                    .filter_map(|i| i.s3)
                    .filter(|&s| line.events[s].on_downbeat())
                    .collect();
                if !onbeat.is_empty() && onbeat.len() < interps.len() {
                    interps.retain(|i| i.s3.map(|s| onbeat.contains(&s)).unwrap_or(true));
                }
            }
            if prefs.bass_s3_repetition {
                // If one candidate could instead be heard as repeating
                // its predecessor, prefer the predecessor.
                let preferred: Vec<usize> = interps
                    .iter()
                    .filter(|i| {
                        i.arcs.iter().any(|a| {
                            a.kind == ArcKind::Repetition
                                && i.s3 == Some(a.first())
                                && a.last() == a.first() + 1
                        })
                    })
                    .filter_map(|i| i.s3)
                    .collect();
                interps.retain(|i| {
                    i.s3.map(|s| !preferred.contains(&(s.wrapping_sub(1))))
                        .unwrap_or(true)
                });
            }
        }
        LineType::Generic => {}
    }
    interps.sort_by_key(|i| (i.s1, i.s3));
}
