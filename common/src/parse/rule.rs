//! The closed alphabet of rule labels. Every note of an interpreted
//! line carries exactly one: the structural codes S1-S3 for the basic
//! structure, E-codes for global elaborations, and L-codes for the
//! local elaborations admitted in florid species.

use serde::Serialize;
use std::fmt;
use std::fmt::{Display, Formatter};

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleLabel {
    /// Head of the basic structure.
    S1,
    /// The closing tonic.
    S2,
    /// The structural dominant: the 5̂ of a bass arpeggiation, or the 2̂
    /// closing a primary line's fundamental descent.
    S3,
    /// Repetition of a triad pitch.
    E1,
    /// Neighboring tone.
    E2,
    /// Arpeggiated or inserted triad pitch.
    E3,
    /// Passing tone.
    E4,
    /// Anticipation of a structural pitch.
    E5,
    /// Register transfer.
    E6,
    /// Local repetition of a nontriadic pitch.
    L1,
    /// Local neighboring tone.
    L2,
    /// Local insertion, consonant with the measure's harmony.
    L3,
}

impl RuleLabel {
    pub fn code(self) -> &'static str {
        match self {
            RuleLabel::S1 => "S1",
            RuleLabel::S2 => "S2",
            RuleLabel::S3 => "S3",
            RuleLabel::E1 => "E1",
            RuleLabel::E2 => "E2",
            RuleLabel::E3 => "E3",
            RuleLabel::E4 => "E4",
            RuleLabel::E5 => "E5",
            RuleLabel::E6 => "E6",
            RuleLabel::L1 => "L1",
            RuleLabel::L2 => "L2",
            RuleLabel::L3 => "L3",
        }
    }

    pub fn is_structural(self) -> bool {
        matches!(self, RuleLabel::S1 | RuleLabel::S2 | RuleLabel::S3)
    }

    pub fn is_local(self) -> bool {
        matches!(self, RuleLabel::L1 | RuleLabel::L2 | RuleLabel::L3)
    }
}

impl Display for RuleLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
