//! Arcs: prolongational spans over event indices. An arc stores indices,
//! never pitches, so that two events with the same pitch stay distinct;
//! this is what makes register-transfer detection possible at all.

use crate::csd::Csd;
use serde::Serialize;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ArcKind {
    /// The line-defining span: fundamental descent, bass arpeggiation,
    /// or the tonic frame of a generic line.
    Basic,
    Passing,
    Neighbor,
    Repetition,
    Arpeggiation,
    Anticipation,
    Transfer,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Arc {
    pub kind: ArcKind,
    /// Strictly increasing event indices; endpoints plus any interior
    /// elaborations the arc covers.
    pub indices: Vec<usize>,
    /// Register-transfer arcs render dashed.
    pub dashed: bool,
}

impl Arc {
    pub fn new(kind: ArcKind, indices: Vec<usize>) -> Arc {
        debug_assert!(indices.len() >= 2);
        debug_assert!(indices.windows(2).all(|w| w[0] < w[1]));
        let dashed = kind == ArcKind::Transfer;
        Arc {
            kind,
            indices,
            dashed,
        }
    }

    pub fn first(&self) -> usize {
        self.indices[0]
    }

    pub fn last(&self) -> usize {
        *self.indices.last().unwrap()
    }

    pub fn interior(&self) -> &[usize] {
        &self.indices[1..self.indices.len() - 1]
    }

    pub fn contains(&self, i: usize) -> bool {
        self.indices.contains(&i)
    }

    /// Strictly inside the arc's span, member or not.
    pub fn spans(&self, i: usize) -> bool {
        self.first() < i && i < self.last()
    }

    pub fn is_terminal(&self, i: usize) -> bool {
        self.first() == i || self.last() == i
    }

    /// Two arcs cross when their spans interleave without nesting.
    /// Shared endpoints do not count as crossing.
    pub fn crosses(&self, other: &Arc) -> bool {
        let (a1, a2) = (self.first(), self.last());
        let (b1, b2) = (other.first(), other.last());
        (a1 < b1 && b1 < a2 && a2 < b2) || (b1 < a1 && a1 < b2 && b2 < a2)
    }
}

/// Whether a note index is strictly spanned by any arc it does not
/// terminate; such a note cannot serve as a structural tone.
pub fn is_covered(i: usize, arcs: &[Arc]) -> bool {
    arcs.iter().any(|a| a.spans(i) && !a.is_terminal(i))
}

pub fn is_arc_terminal(i: usize, arcs: &[Arc]) -> bool {
    arcs.iter().any(|a| a.is_terminal(i))
}

/// Shape tests over concrete scale degrees.
pub fn is_passing_shape(indices: &[usize], csds: &[Csd]) -> bool {
    if indices.len() < 3 {
        return false;
    }
    let dir = (csds[indices[1]].value - csds[indices[0]].value).signum();
    dir != 0
        && indices
            .windows(2)
            .all(|w| csds[w[1]].value - csds[w[0]].value == dir)
}

pub fn is_neighbor_shape(indices: &[usize], csds: &[Csd]) -> bool {
    indices.len() == 3
        && csds[indices[0]].value == csds[indices[2]].value
        && (csds[indices[1]].value - csds[indices[0]].value).abs() == 1
}

/// The invariant the emitted arc sets must satisfy: a properly nested
/// forest, except that a register-transfer arc may cross arcs of its own
/// scale-degree residue.
pub fn is_nested_forest(arcs: &[Arc], csds: &[Csd]) -> bool {
    for (i, a) in arcs.iter().enumerate() {
        for b in &arcs[i + 1..] {
            if !a.crosses(b) {
                continue;
            }
            let transfer = if a.kind == ArcKind::Transfer {
                Some((a, b))
            } else if b.kind == ArcKind::Transfer {
                Some((b, a))
            } else {
                None
            };
            match transfer {
                None => return false,
                Some((t, other)) => {
                    let residue = csds[t.first()].value.rem_euclid(7);
                    if !other
                        .indices
                        .iter()
                        .any(|&x| csds[x].value.rem_euclid(7) == residue)
                    {
                        return false;
                    }
                }
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arc(kind: ArcKind, indices: &[usize]) -> Arc {
        Arc::new(kind, indices.to_vec())
    }

    #[test]
    fn test_crossing() {
        let a = arc(ArcKind::Passing, &[0, 1, 2]);
        let b = arc(ArcKind::Passing, &[1, 2, 3]);
        assert!(a.crosses(&b));
        let c = arc(ArcKind::Neighbor, &[4, 5, 6]);
        assert!(!a.crosses(&c));
        // Nesting and shared endpoints are not crossings.
        let outer = arc(ArcKind::Basic, &[0, 3]);
        let inner = arc(ArcKind::Passing, &[1, 2, 3]);
        assert!(!outer.crosses(&inner));
        let shared = arc(ArcKind::Repetition, &[0, 2]);
        assert!(!a.crosses(&shared));
    }

    #[test]
    fn test_covered() {
        let arcs = vec![arc(ArcKind::Passing, &[0, 1, 2])];
        assert!(is_covered(1, &arcs));
        assert!(!is_covered(0, &arcs));
        assert!(!is_covered(2, &arcs));
        assert!(!is_covered(3, &arcs));
    }
}
