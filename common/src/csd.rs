//! Concrete scale degrees: the tonic-relative, octave-extended degree
//! value attached to every note before parsing. Tonic = 0, the leading
//! tone below = -1, the upper-octave tonic = 7; the residue class mod 7
//! recovers the familiar degree number.

use crate::key::{Key, Mode};
use crate::pitch::Pitch;
use anyhow::bail;
use std::fmt;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsdDirection {
    Ascending,
    Descending,
    Bidirectional,
    None,
}

impl CsdDirection {
    /// Whether a tendency direction admits motion in the given signed
    /// direction (+1 up, -1 down).
    pub fn admits(self, dir: i32) -> bool {
        match self {
            CsdDirection::Ascending => dir >= 0,
            CsdDirection::Descending => dir <= 0,
            CsdDirection::Bidirectional | CsdDirection::None => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Csd {
    pub value: i32,
    pub direction: CsdDirection,
}

impl Csd {
    /// The degree's residue class: 0 = 1̂ .. 6 = 7̂.
    pub fn residue(self) -> i32 {
        self.value.rem_euclid(7)
    }

    /// 1-based degree number for display.
    pub fn degree(self) -> i32 {
        self.residue() + 1
    }

    /// Tonic-triad membership in any octave.
    pub fn is_triad_member(self) -> bool {
        matches!(self.residue(), 0 | 2 | 4)
    }
}

impl Display for Csd {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.value < 0 {
            write!(f, "-{}", self.degree())
        } else {
            write!(f, "{}", self.degree())
        }
    }
}

/// Map a pitch to its concrete scale degree relative to a registral
/// tonic. In minor, 6̂ and 7̂ take their direction from the form actually
/// present: raised forms are ascending, lowered forms descending.
pub fn csd(pitch: Pitch, key: &Key, tonic: Pitch) -> anyhow::Result<Csd> {
    let value = pitch.dnn() - tonic.dnn();
    let degree = value.rem_euclid(7) as usize;
    let classes = key.degree_classes(degree);
    if !classes.contains(&pitch.class()) {
        bail!(
            "At least one of the pitches in the line is not in the scale \
             of {key}: {pitch}."
        );
    }
    let direction = match (key.mode, degree) {
        (Mode::Major, _) => CsdDirection::None,
        (Mode::Minor, 5 | 6) => {
            if classes.len() == 2 && pitch.class() == classes[0] {
                CsdDirection::Ascending
            } else {
                CsdDirection::Descending
            }
        }
        (Mode::Minor, _) => CsdDirection::Bidirectional,
    };
    Ok(Csd { value, direction })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch::parse_pitch_class;

    fn key(s: &str, mode: Mode) -> Key {
        Key::new(parse_pitch_class(s).unwrap(), mode)
    }

    fn p(s: &str) -> Pitch {
        Pitch::must_parse(s)
    }

    #[test]
    fn test_major_values() {
        let c = key("C", Mode::Major);
        let tonic = p("C4");
        assert_eq!(csd(p("C4"), &c, tonic).unwrap().value, 0);
        assert_eq!(csd(p("B3"), &c, tonic).unwrap().value, -1);
        assert_eq!(csd(p("C5"), &c, tonic).unwrap().value, 7);
        assert_eq!(csd(p("G4"), &c, tonic).unwrap().value, 4);
        assert_eq!(csd(p("G3"), &c, tonic).unwrap().value, -3);
        assert_eq!(csd(p("D5"), &c, tonic).unwrap().degree(), 2);
        assert!(csd(p("F#4"), &c, tonic).is_err());
    }

    #[test]
    fn test_minor_directions() {
        let d = key("D", Mode::Minor);
        let tonic = p("D4");
        // Raised forms ascend, lowered forms descend.
        assert_eq!(
            csd(p("B4"), &d, tonic).unwrap().direction,
            CsdDirection::Ascending
        );
        assert_eq!(
            csd(p("B-4"), &d, tonic).unwrap().direction,
            CsdDirection::Descending
        );
        assert_eq!(
            csd(p("C#5"), &d, tonic).unwrap().direction,
            CsdDirection::Ascending
        );
        assert_eq!(
            csd(p("C5"), &d, tonic).unwrap().direction,
            CsdDirection::Descending
        );
        assert_eq!(
            csd(p("F4"), &d, tonic).unwrap().direction,
            CsdDirection::Bidirectional
        );
        // Values are independent of the form.
        assert_eq!(csd(p("B-4"), &d, tonic).unwrap().value, 5);
        assert_eq!(csd(p("B4"), &d, tonic).unwrap().value, 5);
    }

    #[test]
    fn test_triad_membership() {
        let c = key("C", Mode::Major);
        let tonic = p("C4");
        for (s, member) in [("C4", true), ("E4", true), ("G3", true), ("D4", false)] {
            assert_eq!(
                csd(p(s), &c, tonic).unwrap().is_triad_member(),
                member,
                "{s}"
            );
        }
    }
}
