//! The scan state and the transition function. The scanner walks the
//! line left to right; at each transition it classifies the new note
//! against the open heads and open transitions and either extends the
//! state, closes arcs, forks (when more than one rule could apply), or
//! kills the branch with a diagnostic. States are plain values cloned on
//! forking; surviving states feed the line-type completion passes.

use super::Line;
use super::arc::{Arc, ArcKind, is_neighbor_shape, is_passing_shape};
use crate::pitch::Interval;
use log::debug;

/// Live-branch limit; exceeding it abandons the part's parse.
pub const BRANCH_CAP: usize = 512;

pub const SEARCH_LIMIT_ERROR: &str = "Interpretation search exceeded limits.";

/// Dependency links of one event: the head it hangs from on the left,
/// the head that resolves it on the right, and the events hanging from
/// it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dep {
    pub lefthead: Option<usize>,
    pub righthead: Option<usize>,
    pub dependents: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanState {
    /// Events eligible to head a not-yet-closed arc, ascending.
    pub heads: Vec<usize>,
    /// Interior events awaiting stepwise resolution, ascending.
    pub transitions: Vec<usize>,
    pub arcs: Vec<Arc>,
    pub deps: Vec<Dep>,
    /// Free local insertions admitted in florid species.
    pub locals: Vec<usize>,
}

/// A branch-killing diagnostic, anchored to the event that caused it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanError {
    pub index: usize,
    pub message: String,
}

impl ScanState {
    fn new(n: usize) -> ScanState {
        ScanState {
            heads: vec![0],
            transitions: Vec::new(),
            arcs: Vec::new(),
            deps: vec![Dep::default(); n],
            locals: Vec::new(),
        }
    }

    fn add_head(&mut self, i: usize) {
        if let Err(pos) = self.heads.binary_search(&i) {
            self.heads.insert(pos, i);
        }
    }

    fn push_arc(&mut self, arc: Arc) {
        if !self.arcs.contains(&arc) {
            self.arcs.push(arc);
        }
    }

    fn attach(&mut self, j: usize, lefthead: usize) {
        self.deps[j].lefthead = Some(lefthead);
        self.deps[lefthead].dependents.push(j);
    }

    /// Close the chain of open transitions ending at `t` with righthead
    /// `j`, emitting a passing or neighbor arc. The arc covers the
    /// closure of `t`'s codependents that hang from the same lefthead,
    /// so nested elaborations of the transition come along.
    fn resolve(&mut self, t: usize, j: usize, line: &Line) {
        let l = self.deps[t].lefthead.expect("open transition has a lefthead");
        let mut interior = vec![t];
        // Codependents that hang from the same lefthead come along.
        let mut frontier = vec![t];
        while let Some(x) = frontier.pop() {
            for &d in &self.deps[x].dependents {
                if l < d
                    && d < j
                    && self.deps[d].lefthead == Some(l)
                    && self.deps[d].righthead.is_none()
                    && !interior.contains(&d)
                {
                    interior.push(d);
                    frontier.push(d);
                }
            }
        }
        // So do heads of nested elaborations that hang from the same
        // lefthead (e.g. the prolonged tone of an inner neighbor).
        for x in l + 1..j {
            if !interior.contains(&x)
                && self.deps[x].lefthead == Some(l)
                && self.deps[x].righthead.is_none()
                && self.arcs.iter().any(|a| a.first() == x && a.last() < j)
            {
                interior.push(x);
            }
        }
        interior.sort_unstable();
        interior.dedup();
        for &x in &interior {
            self.deps[x].righthead = Some(j);
            if !self.deps[j].dependents.contains(&x) {
                self.deps[j].dependents.push(x);
            }
        }
        let mut indices = vec![l];
        indices.extend(&interior);
        indices.push(j);
        // Classify by surface shape; spans that fit neither template
        // (e.g. a double neighbor) fall back to the endpoint relation.
        let kind = if is_neighbor_shape(&indices, line.csds) {
            ArcKind::Neighbor
        } else if is_passing_shape(&indices, line.csds) {
            ArcKind::Passing
        } else if line.value(l) == line.value(j) {
            ArcKind::Neighbor
        } else {
            ArcKind::Passing
        };
        self.push_arc(Arc::new(kind, indices));
        self.transitions.retain(|x| !interior.contains(x));
    }

    /// Record a plain repetition: `j` depends on the same-pitch `i`.
    fn repeat(&mut self, i: usize, j: usize) {
        self.attach(j, i);
        self.push_arc(Arc::new(ArcKind::Repetition, vec![i, j]));
    }
}

/// Direction compatibility of a tendency tone with a resolution moving
/// in signed direction `dir`.
fn admits(line: &Line, i: usize, dir: i32) -> bool {
    line.csds[i].direction.admits(dir)
}

fn step_between(line: &Line, a: usize, b: usize) -> Option<i32> {
    let iv = Interval::between(line.events[a].pitch, line.events[b].pitch);
    iv.is_step().then(|| iv.direction())
}

/// Advance one state across the transition from event `i` to event `j`.
/// Returns the successor branches, or an error that kills this branch.
fn advance(
    line: &Line,
    mut st: ScanState,
    i: usize,
    j: usize,
) -> Result<Vec<ScanState>, ScanError> {
    let iv = Interval::between(line.events[i].pitch, line.events[j].pitch);
    let (pi, mi) = line.place(i);
    let (pj, mj) = line.place(j);
    let harm_i = line.harmonic(i);
    let harm_j = line.harmonic(j);

    if !iv.is_semi_simple() {
        return Err(ScanError {
            index: j,
            message: format!("Leap larger than an octave between {pi} and {pj} in measure {mj}."),
        });
    }

    // Unisons: repetitions, generable globally only for triad pitches.
    if iv.is_unison() {
        if harm_i && harm_j {
            st.repeat(i, j);
            return Ok(vec![st]);
        }
        if line.is_florid() {
            // A local repetition; the new note takes over the pending
            // resolution duty.
            let was_open = st.transitions.contains(&i);
            st.repeat(i, j);
            if was_open {
                st.transitions.retain(|&x| x != i);
                st.transitions.push(j);
                st.deps[j].lefthead = st.deps[i].lefthead;
            }
            return Ok(vec![st]);
        }
        return Err(ScanError {
            index: j,
            message: format!("Repetition of a non-tonic-triad pitch: {pj} in measure {mj}."),
        });
    }

    if iv.is_step() {
        let dir = iv.direction();
        match (harm_i, harm_j) {
            // Step from harmonic to nonharmonic: the new note opens (or
            // continues) a transition.
            (true, false) => {
                // Does j continue an open transition a step away?
                for &t in st.transitions.clone().iter().rev() {
                    if let Some(d) = step_between(line, t, j) {
                        let monotone = st.deps[t]
                            .lefthead
                            .map(|l| (line.value(t) - line.value(l)).signum() == d.signum())
                            .unwrap_or(true);
                        if monotone
                            && admits(line, t, d)
                            && admits(line, j, d)
                            && st.deps[t].dependents.is_empty()
                        {
                            let l = st.deps[t].lefthead.unwrap();
                            st.attach(j, l);
                            st.deps[j].dependents.push(t);
                            st.deps[t].dependents.push(j);
                            st.transitions.retain(|&x| x != t);
                            st.transitions.push(j);
                            return Ok(vec![st]);
                        }
                    }
                }
                // Otherwise hang j from the most recent head with i's
                // pitch (usually i itself).
                let lefthead = st
                    .heads
                    .iter()
                    .rev()
                    .copied()
                    .find(|&h| line.value(h) == line.value(i))
                    .unwrap_or(i);
                st.attach(j, lefthead);
                st.transitions.push(j);
                Ok(vec![st])
            }
            // Step from nonharmonic to harmonic: a forced closure when
            // the tendency direction matches.
            (false, true) => {
                if st.transitions.contains(&i) {
                    if admits(line, i, dir) {
                        st.resolve(i, j, line);
                        st.add_head(j);
                    } else {
                        // A tendency tone stepping against its direction
                        // does not resolve here.
                        st.add_head(j);
                    }
                } else {
                    st.add_head(j);
                }
                Ok(vec![st])
            }
            // Step between nonharmonic pitches: the transition grows, or
            // turns back as a neighbor of the tone it just left.
            (false, false) => {
                if st.transitions.contains(&i) {
                    let l = st.deps[i].lefthead.unwrap();
                    let monotone = (line.value(i) - line.value(l)).signum() == dir.signum();
                    if monotone && admits(line, i, dir) && admits(line, j, dir) {
                        st.attach(j, l);
                        st.deps[j].dependents.push(i);
                        st.deps[i].dependents.push(j);
                        st.transitions.retain(|&x| x != i);
                        st.transitions.push(j);
                        return Ok(vec![st]);
                    }
                    // x-y-x around a nonharmonic tone: close the inner
                    // neighbor and let j take over x's obligations.
                    if let Some(&d) = st.deps[i]
                        .dependents
                        .iter()
                        .rev()
                        .find(|&&d| d < i && line.value(d) == line.value(j))
                    {
                        // The inner neighbor hangs from the tone it
                        // decorates, and j takes over that tone's
                        // unresolved duty.
                        st.deps[i].lefthead = Some(d);
                        st.deps[i].righthead = Some(j);
                        st.deps[j].dependents.push(i);
                        st.push_arc(Arc::new(ArcKind::Neighbor, vec![d, i, j]));
                        st.deps[j].lefthead = st.deps[d].lefthead;
                        if let Some(l) = st.deps[d].lefthead {
                            st.deps[l].dependents.push(j);
                        }
                        st.transitions.retain(|&x| x != i);
                        st.transitions.push(j);
                        return Ok(vec![st]);
                    }
                }
                if line.is_florid() && line.consonant_with_local_harmony(j) {
                    st.locals.push(j);
                    return Ok(vec![st]);
                }
                Err(ScanError {
                    index: j,
                    message: format!(
                        "The non-tonic-triad pitch {pj} in measure {mj} cannot be generated."
                    ),
                })
            }
            // Adjacent triad pitches are never a diatonic step apart.
            (true, true) => Ok(vec![st]),
        }
    } else if iv.is_linear_consonance() {
        match (harm_i, harm_j) {
            (true, true) => {
                // Octave between the same degree: a register transfer.
                if (line.value(j) - line.value(i)).abs() == 7 {
                    st.push_arc(Arc::new(ArcKind::Transfer, vec![i, j]));
                    st.add_head(j);
                    return Ok(vec![st]);
                }
                st.push_arc(Arc::new(ArcKind::Arpeggiation, vec![i, j]));
                // The skip may also close an open transition whose goal
                // is j; when it can, explore both hearings.
                let mut branches = Vec::new();
                for &t in st.transitions.iter().rev() {
                    if let Some(d) = step_between(line, t, j) {
                        if admits(line, t, d) {
                            let mut forked = st.clone();
                            forked.resolve(t, j, line);
                            forked.heads.retain(|&h| !(t < h && h < j));
                            forked.add_head(j);
                            branches.push(forked);
                            break;
                        }
                    }
                }
                st.add_head(j);
                branches.push(st);
                Ok(branches)
            }
            // Consonant skip onto a nonharmonic pitch: it must hang from
            // a step-related open head, or (in florid species) stand as a
            // local insertion.
            (true, false) | (false, false) => {
                if harm_i || !st.transitions.contains(&i) {
                    let found = st
                        .heads
                        .iter()
                        .rev()
                        .copied()
                        .find(|&h| step_between(line, h, j).is_some());
                    if let Some(h) = found {
                        st.attach(j, h);
                        st.transitions.push(j);
                        return Ok(vec![st]);
                    }
                }
                if line.is_florid()
                    && !line.events[j].on_downbeat()
                    && line.consonant_with_local_harmony(j)
                {
                    st.locals.push(j);
                    return Ok(vec![st]);
                }
                if !harm_i && !harm_j {
                    return Err(ScanError {
                        index: j,
                        message: format!(
                            "Nongenerable succession between {pi} and {pj} in measure {mi}."
                        ),
                    });
                }
                Err(ScanError {
                    index: j,
                    message: format!(
                        "The non-tonic-triad pitch {pj} in measure {mj} cannot be generated."
                    ),
                })
            }
            // Skip away from a nonharmonic pitch onto a triad pitch: the
            // transition stays open for a later resolution.
            (false, true) => {
                st.add_head(j);
                Ok(vec![st])
            }
        }
    } else {
        Err(ScanError {
            index: j,
            message: format!("Nongenerable leap between {pi} and {pj} in measure {mj}."),
        })
    }
}

/// Run the scanner over a line. Returns every surviving state, or the
/// diagnostics of the shallowest failure when no branch survives.
pub fn scan(line: &Line) -> Result<Vec<ScanState>, Vec<ScanError>> {
    let n = line.len();
    // Tie continuations are not re-attacked notes; the scan skips them.
    let order: Vec<usize> = (0..n)
        .filter(|&i| !line.events[i].tied_from_prev)
        .collect();
    let mut states = vec![ScanState::new(n)];
    for w in order.windows(2) {
        let (i, j) = (w[0], w[1]);
        let mut next: Vec<ScanState> = Vec::new();
        let mut errors: Vec<ScanError> = Vec::new();
        for st in states {
            match advance(line, st, i, j) {
                Ok(branches) => {
                    for b in branches {
                        if !next.contains(&b) {
                            next.push(b);
                        }
                    }
                }
                Err(e) => {
                    if !errors.contains(&e) {
                        errors.push(e);
                    }
                }
            }
        }
        if next.is_empty() {
            return Err(errors);
        }
        if next.len() > BRANCH_CAP {
            return Err(vec![ScanError {
                index: j,
                message: SEARCH_LIMIT_ERROR.to_string(),
            }]);
        }
        debug!(
            "scan state at {j}: {} branch(es), heads {:?}, transitions {:?}",
            next.len(),
            next[0].heads,
            next[0].transitions
        );
        states = next;
    }

    // Branches with undischarged transitions are unresolvable: prune
    // them, keeping their diagnostics in case nothing survives.
    let mut survivors = Vec::new();
    let mut errors = Vec::new();
    for mut st in states {
        if line.is_florid() {
            let transitions = std::mem::take(&mut st.transitions);
            let (local, open): (Vec<usize>, Vec<usize>) = transitions
                .into_iter()
                .partition(|&t| line.consonant_with_local_harmony(t));
            st.locals.extend(local);
            st.transitions = open;
        }
        if st.transitions.is_empty() {
            survivors.push(st);
        } else {
            let mut measures: Vec<String> = st
                .transitions
                .iter()
                .map(|&t| line.events[t].measure.to_string())
                .collect();
            measures.dedup();
            let e = ScanError {
                index: *st.transitions.last().unwrap(),
                message: format!(
                    "There are unclosed transitions in the following measures: {}.",
                    measures.join(", ")
                ),
            };
            if !errors.contains(&e) {
                errors.push(e);
            }
        }
    }
    if survivors.is_empty() {
        return Err(errors);
    }
    Ok(survivors)
}

#[cfg(test)]
mod tests;
