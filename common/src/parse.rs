//! The line parser: a transition-based dependency parser over the notes
//! of a single part. A left-to-right scan classifies each note as
//! dependent on, extending, resolving, or independent of what came
//! before, maintaining lists of open heads and open transitions and
//! closing prolongational arcs as it goes. Ambiguous transitions fork
//! the scan state. After the scan, line-type completion searches each
//! surviving state for basic structures (primary, bass, generic) and
//! emits one interpretation per way of hearing the line.

use crate::csd::Csd;
use crate::pitch::PitchClass;
use crate::score::{Event, Species};
use serde::Serialize;
use std::fmt;
use std::fmt::{Display, Formatter};

pub mod arc;
pub mod interp;
pub mod rule;
pub mod state;

pub use arc::{Arc, ArcKind};
pub use interp::{Interpretation, PartAnalysis, Preferences, parse_part};
pub use rule::RuleLabel;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LineType {
    Primary,
    Bass,
    Generic,
}

impl Display for LineType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            LineType::Primary => "primary",
            LineType::Bass => "bass",
            LineType::Generic => "generic",
        };
        write!(f, "{name}")
    }
}

/// Everything the scanner and the completion passes need to know about
/// one line, borrowed from the global context.
pub struct Line<'a> {
    pub events: &'a [Event],
    pub csds: &'a [Csd],
    pub species: Species,
    /// Per-measure harmonic essentials, when derived (species 3/5).
    pub harmonies: &'a [Vec<PitchClass>],
}

impl Line<'_> {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Tonic-triad membership, the global harmonic reference.
    pub fn harmonic(&self, i: usize) -> bool {
        self.csds[i].is_triad_member()
    }

    pub fn is_florid(&self) -> bool {
        matches!(self.species, Species::Third | Species::Fifth)
    }

    /// Consonance of a note with the local harmony of its measure.
    pub fn consonant_with_local_harmony(&self, i: usize) -> bool {
        let e = &self.events[i];
        match self.harmonies.get(e.measure - 1) {
            Some(pcs) => {
                let pc = e.pitch.class();
                pcs.iter().all(|other| {
                    let ic = (pc.chroma() - other.chroma()).rem_euclid(12);
                    matches!(ic, 0 | 3 | 4 | 5 | 7 | 8 | 9)
                })
            }
            None => false,
        }
    }

    pub fn value(&self, i: usize) -> i32 {
        self.csds[i].value
    }

    /// "F#4 in measure 2" coordinates for diagnostics.
    pub fn place(&self, i: usize) -> (String, usize) {
        (self.events[i].pitch.to_string(), self.events[i].measure)
    }
}
