use crate::to_anyhow;
use anyhow::bail;
use serde::de::Visitor;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::cmp::Ordering;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use winnow::Parser;

mod parser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Letter {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl Letter {
    pub const ALL: [Letter; 7] = [
        Letter::C,
        Letter::D,
        Letter::E,
        Letter::F,
        Letter::G,
        Letter::A,
        Letter::B,
    ];

    /// Diatonic step number within the octave. C = 0 .. B = 6.
    pub fn step(self) -> i32 {
        match self {
            Letter::C => 0,
            Letter::D => 1,
            Letter::E => 2,
            Letter::F => 3,
            Letter::G => 4,
            Letter::A => 5,
            Letter::B => 6,
        }
    }

    /// Chromatic pitch class of the natural letter. C = 0 .. B = 11.
    pub fn chroma(self) -> i32 {
        match self {
            Letter::C => 0,
            Letter::D => 2,
            Letter::E => 4,
            Letter::F => 5,
            Letter::G => 7,
            Letter::A => 9,
            Letter::B => 11,
        }
    }

    pub fn from_step(step: i32) -> Letter {
        Letter::ALL[step.rem_euclid(7) as usize]
    }

    pub fn from_char(c: char) -> Option<Letter> {
        match c.to_ascii_uppercase() {
            'C' => Some(Letter::C),
            'D' => Some(Letter::D),
            'E' => Some(Letter::E),
            'F' => Some(Letter::F),
            'G' => Some(Letter::G),
            'A' => Some(Letter::A),
            'B' => Some(Letter::B),
            _ => None,
        }
    }
}

impl Display for Letter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let c = match self {
            Letter::C => 'C',
            Letter::D => 'D',
            Letter::E => 'E',
            Letter::F => 'F',
            Letter::G => 'G',
            Letter::A => 'A',
            Letter::B => 'B',
        };
        write!(f, "{c}")
    }
}

fn write_alter(f: &mut Formatter<'_>, alter: i32) -> fmt::Result {
    let mark = match alter.cmp(&0) {
        Ordering::Greater => "#",
        Ordering::Less => "-",
        Ordering::Equal => return Ok(()),
    };
    for _ in 0..alter.abs() {
        write!(f, "{mark}")?;
    }
    Ok(())
}

/// A spelled pitch class: letter plus chromatic alteration, no register.
/// Flats are written `-` and sharps `#`, so "E-" is E-flat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PitchClass {
    pub letter: Letter,
    pub alter: i32,
}

impl PitchClass {
    pub fn new(letter: Letter, alter: i32) -> Self {
        Self { letter, alter }
    }

    pub fn chroma(self) -> i32 {
        (self.letter.chroma() + self.alter).rem_euclid(12)
    }

    /// Place this pitch class in a register.
    pub fn in_octave(self, octave: i32) -> Pitch {
        Pitch {
            letter: self.letter,
            alter: self.alter,
            octave,
        }
    }

    /// Spelled transposition, preserving letter arithmetic.
    pub fn transpose(self, interval: Interval) -> PitchClass {
        self.in_octave(4).transpose(interval).class()
    }
}

impl Display for PitchClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter)?;
        write_alter(f, self.alter)
    }
}

/// A spelled pitch: letter, alteration, octave. Octaves change at C, so
/// B3 is a diatonic step below C4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pitch {
    pub letter: Letter,
    pub alter: i32,
    pub octave: i32,
}

impl Pitch {
    pub fn new(letter: Letter, alter: i32, octave: i32) -> Self {
        Self {
            letter,
            alter,
            octave,
        }
    }

    pub fn class(self) -> PitchClass {
        PitchClass {
            letter: self.letter,
            alter: self.alter,
        }
    }

    /// Diatonic note number: 7 per octave, C4 = 28. Two pitches are a
    /// "step" apart when their note numbers differ by one, regardless of
    /// alteration.
    pub fn dnn(self) -> i32 {
        self.octave * 7 + self.letter.step()
    }

    /// Chromatic pitch space number (MIDI numbering, C4 = 60).
    pub fn ps(self) -> i32 {
        (self.octave + 1) * 12 + self.letter.chroma() + self.alter
    }

    pub fn chroma(self) -> i32 {
        self.ps().rem_euclid(12)
    }

    /// Spelled transposition: the letter moves by the interval's generic
    /// size and the alteration absorbs whatever is left of the chromatic
    /// size.
    pub fn transpose(self, interval: Interval) -> Pitch {
        let dnn = self.dnn() + interval.steps;
        let letter = Letter::from_step(dnn);
        let octave = dnn.div_euclid(7);
        let natural = Pitch::new(letter, 0, octave);
        let alter = self.ps() + interval.semitones - natural.ps();
        Pitch::new(letter, alter, octave)
    }

    /// Parse a pitch from its string form, e.g. "F#4", "B-3", "C4".
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        parser::pitch().parse(s).map_err(to_anyhow)
    }

    pub fn must_parse(s: &str) -> Self {
        Self::parse(s).unwrap()
    }
}

impl Display for Pitch {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter)?;
        write_alter(f, self.alter)?;
        write!(f, "{}", self.octave)
    }
}

impl PartialOrd for Pitch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Pitch {
    /// Ordered by sounding height; enharmonic ties broken by spelling.
    fn cmp(&self, other: &Self) -> Ordering {
        (self.ps(), self.dnn()).cmp(&(other.ps(), other.dnn()))
    }
}

impl FromStr for Pitch {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Pitch {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Pitch {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PitchVisitor;

        impl Visitor<'_> for PitchVisitor {
            type Value = Pitch;

            fn expecting(&self, formatter: &mut Formatter) -> fmt::Result {
                formatter.write_str("a string representing a pitch, e.g. \"F#4\"")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Pitch::parse(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(PitchVisitor)
    }
}

/// A spelled interval between two pitches: signed diatonic steps plus
/// signed semitones. Storing both components keeps the quality of the
/// spelling ("A2" vs "m3") available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    pub steps: i32,
    pub semitones: i32,
}

impl Interval {
    pub const UNISON: Interval = Interval::new(0, 0);
    pub const MINOR_THIRD: Interval = Interval::new(2, 3);
    pub const MAJOR_THIRD: Interval = Interval::new(2, 4);
    pub const PERFECT_FOURTH: Interval = Interval::new(3, 5);
    pub const PERFECT_FIFTH: Interval = Interval::new(4, 7);
    pub const MINOR_SIXTH: Interval = Interval::new(5, 8);
    pub const MAJOR_SIXTH: Interval = Interval::new(5, 9);
    pub const OCTAVE: Interval = Interval::new(7, 12);

    pub const fn new(steps: i32, semitones: i32) -> Self {
        Self { steps, semitones }
    }

    pub fn between(a: Pitch, b: Pitch) -> Interval {
        Interval::new(b.dnn() - a.dnn(), b.ps() - a.ps())
    }

    pub const fn down(self) -> Interval {
        Interval::new(-self.steps, -self.semitones)
    }

    /// Generic interval size, unsigned: 1 = unison, 2 = second, 8 = octave.
    pub fn generic(self) -> i32 {
        self.steps.abs() + 1
    }

    /// Generic size reduced to one octave, keeping 8 for exact octaves
    /// (the "semi-simple" reduction).
    pub fn simple_generic(self) -> i32 {
        let mut g = self.generic();
        while g > 8 {
            g -= 7;
        }
        g
    }

    fn simple_semitones(self) -> i32 {
        let removed = (self.generic() - self.simple_generic()) / 7;
        self.semitones.abs() - 12 * removed
    }

    /// The interval's conventional name in its semi-simple form: "P5",
    /// "m3", "A4", "d5", ... Direction is not part of the name.
    pub fn name(self) -> String {
        let g = self.simple_generic();
        // Semitone width of the perfect or major form of each generic size.
        const BASE: [i32; 8] = [0, 2, 4, 5, 7, 9, 11, 12];
        let base = BASE[(g - 1) as usize];
        let perfect = matches!(g, 1 | 4 | 5 | 8);
        let diff = self.simple_semitones() - base;
        let quality = match (perfect, diff) {
            (true, 0) => "P",
            (true, -1) => "d",
            (true, -2) => "dd",
            (false, 0) => "M",
            (false, -1) => "m",
            (false, -2) => "d",
            (_, 1) => "A",
            (_, 2) => "AA",
            _ => "?",
        };
        format!("{quality}{g}")
    }

    pub fn direction(self) -> i32 {
        if self.steps != 0 {
            self.steps.signum()
        } else {
            self.semitones.signum()
        }
    }

    /// A diatonic step: minor or major second.
    pub fn is_step(self) -> bool {
        self.steps.abs() == 1 && matches!(self.semitones.abs(), 1 | 2)
    }

    pub fn is_unison(self) -> bool {
        self.steps == 0 && self.semitones == 0
    }

    /// Melodic consonance: the leaps a line may take.
    pub fn is_linear_consonance(self) -> bool {
        self.generic() <= 8
            && matches!(
                self.name().as_str(),
                "m3" | "M3" | "P4" | "P5" | "m6" | "M6" | "P8"
            )
    }

    /// True if the interval does not exceed an octave.
    pub fn is_semi_simple(self) -> bool {
        self.generic() <= 8
    }

    pub fn is_augmented(self) -> bool {
        self.name().starts_with('A')
    }

    pub fn is_diminished(self) -> bool {
        self.name().starts_with('d')
    }
}

impl Display for Interval {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Validate a spelled pitch-class name such as "C", "F#", "B-".
pub fn parse_pitch_class(s: &str) -> anyhow::Result<PitchClass> {
    let mut chars = s.chars();
    let Some(letter) = chars.next().and_then(Letter::from_char) else {
        bail!("'{s}' is not a pitch name");
    };
    let rest: String = chars.collect();
    let alter = match rest.as_str() {
        "" => 0,
        "#" => 1,
        "##" => 2,
        "-" => -1,
        "--" => -2,
        _ => bail!("'{s}' is not a pitch name"),
    };
    Ok(PitchClass::new(letter, alter))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> Pitch {
        Pitch::must_parse(s)
    }

    #[test]
    fn test_parse() {
        assert_eq!(p("C4"), Pitch::new(Letter::C, 0, 4));
        assert_eq!(p("F#4"), Pitch::new(Letter::F, 1, 4));
        assert_eq!(p("B-3"), Pitch::new(Letter::B, -1, 3));
        assert_eq!(p("G--2"), Pitch::new(Letter::G, -2, 2));
        assert_eq!(p("c4"), p("C4"));
        assert!(Pitch::parse("H4").is_err());
        assert!(Pitch::parse("C").is_err());
        assert!(Pitch::parse("C#").is_err());
        assert!(Pitch::parse("4").is_err());
        assert!(Pitch::parse("C4x").is_err());
        assert!(Pitch::parse("").is_err());
    }

    #[test]
    fn test_display_round_trip() {
        for s in ["C4", "F#4", "B-3", "E--5", "A##2", "C-1"] {
            assert_eq!(p(s).to_string(), s);
        }
    }

    #[test]
    fn test_numbers() {
        assert_eq!(p("C4").dnn(), 28);
        assert_eq!(p("B3").dnn(), 27);
        assert_eq!(p("C4").ps(), 60);
        assert_eq!(p("A4").ps(), 69);
        assert_eq!(p("B-3").ps(), 58);
        assert_eq!(p("B#3").chroma(), 0);
        assert!(p("B3") < p("C4"));
        assert!(p("C#4") < p("D4"));
    }

    #[test]
    fn test_intervals() {
        let iv = |a: &str, b: &str| Interval::between(p(a), p(b));
        assert_eq!(iv("C4", "D4").name(), "M2");
        assert_eq!(iv("E4", "F4").name(), "m2");
        assert_eq!(iv("C4", "G4").name(), "P5");
        assert_eq!(iv("G3", "C4").name(), "P4");
        assert_eq!(iv("C4", "C5").name(), "P8");
        assert_eq!(iv("F4", "B4").name(), "A4");
        assert_eq!(iv("B3", "F4").name(), "d5");
        assert_eq!(iv("C4", "E-4").name(), "m3");
        assert_eq!(iv("D4", "C4").name(), "M2");
        assert_eq!(iv("C4", "D5").name(), "M2");
        assert!(iv("C4", "D4").is_step());
        assert!(!iv("C4", "D#4").is_step());
        assert!(iv("C4", "E4").is_linear_consonance());
        assert!(iv("C4", "A4").is_linear_consonance());
        assert!(!iv("C4", "B4").is_linear_consonance());
        assert!(!iv("F4", "B4").is_linear_consonance());
        assert!(!iv("C4", "E5").is_linear_consonance());
        assert!(iv("C4", "C4").is_unison());
    }

    #[test]
    fn test_transpose() {
        assert_eq!(p("C4").transpose(Interval::PERFECT_FIFTH), p("G4"));
        assert_eq!(p("A4").transpose(Interval::MINOR_THIRD.down()), p("F#4"));
        assert_eq!(p("E4").transpose(Interval::MAJOR_THIRD.down()), p("C4"));
        assert_eq!(p("B-3").transpose(Interval::PERFECT_FOURTH), p("E-4"));
        assert_eq!(p("B3").transpose(Interval::new(1, 1)), p("C4"));
        assert_eq!(
            parse_pitch_class("E-")
                .unwrap()
                .transpose(Interval::MAJOR_SIXTH),
            parse_pitch_class("C").unwrap()
        );
    }

    #[test]
    fn test_pitch_class_names() {
        assert!(parse_pitch_class("C").is_ok());
        assert!(parse_pitch_class("F#").is_ok());
        assert!(parse_pitch_class("B-").is_ok());
        assert!(parse_pitch_class("Q#").is_err());
        assert!(parse_pitch_class("C%").is_err());
    }
}
