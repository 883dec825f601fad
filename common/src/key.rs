//! Keys, scales, and the key finder.
//!
//! The key finder either validates a key supplied by the user or infers
//! one from the score. Inference intersects two independent per-part
//! candidate derivations: a scale/terminal/leap filter over all 24
//! chromatic keys, and a "hanging note" analysis that asks which tonic
//! triads cover the pitches left unresolved at the end of the line.
//! Preference rules then winnow any remaining ambiguity.

use crate::pitch::{Interval, Letter, Pitch, PitchClass};
use crate::score::{Event, Part, Score, Species};
use anyhow::bail;
use std::collections::BTreeSet;
use std::fmt;
use std::fmt::{Display, Formatter};

const MAJOR_SEMIS: [i32; 7] = [0, 2, 4, 5, 7, 9, 11];
const MINOR_ASC_SEMIS: [i32; 7] = [0, 2, 3, 5, 7, 9, 11];
const MINOR_DESC_SEMIS: [i32; 7] = [0, 2, 3, 5, 7, 8, 10];

const MAJOR_TRIAD: [i32; 3] = [0, 4, 7];
const MINOR_TRIAD: [i32; 3] = [0, 3, 7];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Mode {
    Major,
    Minor,
}

impl Display for Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Major => write!(f, "major"),
            Mode::Minor => write!(f, "minor"),
        }
    }
}

/// A key: spelled tonic plus mode. In minor the operative scale is the
/// bidirectional melodic minor, so 6̂ and 7̂ each admit two forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Key {
    pub tonic: PitchClass,
    pub mode: Mode,
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.tonic, self.mode)
    }
}

impl Key {
    pub fn new(tonic: PitchClass, mode: Mode) -> Self {
        Self { tonic, mode }
    }

    /// The spelled pitch class of a scale degree (0 = tonic .. 6), in a
    /// given form for the minor 6̂/7̂.
    fn degree_class(&self, degree: usize, semis: &[i32; 7]) -> PitchClass {
        let letter = Letter::from_step(self.tonic.letter.step() + degree as i32);
        let expected = (self.tonic.chroma() + semis[degree]).rem_euclid(12);
        let mut alter = expected - letter.chroma();
        if alter > 6 {
            alter -= 12;
        } else if alter < -6 {
            alter += 12;
        }
        PitchClass::new(letter, alter)
    }

    /// The alterations admitted for each scale degree; one for most
    /// degrees, two for the minor 6̂ and 7̂.
    pub fn degree_classes(&self, degree: usize) -> Vec<PitchClass> {
        match self.mode {
            Mode::Major => vec![self.degree_class(degree, &MAJOR_SEMIS)],
            Mode::Minor => {
                let asc = self.degree_class(degree, &MINOR_ASC_SEMIS);
                let desc = self.degree_class(degree, &MINOR_DESC_SEMIS);
                if asc == desc {
                    vec![asc]
                } else {
                    vec![asc, desc]
                }
            }
        }
    }

    pub fn contains(&self, pc: PitchClass) -> bool {
        let degree = (pc.letter.step() - self.tonic.letter.step()).rem_euclid(7) as usize;
        self.degree_classes(degree).contains(&pc)
    }

    /// The tonic triad: 1̂, 3̂, 5̂.
    pub fn tonic_triad(&self) -> [PitchClass; 3] {
        let semis = match self.mode {
            Mode::Major => &MAJOR_SEMIS,
            Mode::Minor => &MINOR_DESC_SEMIS,
        };
        [
            self.degree_class(0, semis),
            self.degree_class(2, semis),
            self.degree_class(4, semis),
        ]
    }

    pub fn is_triad_member(&self, pc: PitchClass) -> bool {
        self.tonic_triad().contains(&pc)
    }
}

/// Keys whose signatures are actually in use; anything else (G# major,
/// F- minor, ...) is rejected as not a valid key name.
const VALID_KEYS: [(&str, Mode); 30] = [
    ("A-", Mode::Minor),
    ("A-", Mode::Major),
    ("A", Mode::Minor),
    ("A", Mode::Major),
    ("A#", Mode::Minor),
    ("B-", Mode::Minor),
    ("B-", Mode::Major),
    ("B", Mode::Minor),
    ("B", Mode::Major),
    ("C-", Mode::Major),
    ("C", Mode::Minor),
    ("C", Mode::Major),
    ("C#", Mode::Minor),
    ("C#", Mode::Major),
    ("D-", Mode::Major),
    ("D", Mode::Minor),
    ("D", Mode::Major),
    ("D#", Mode::Minor),
    ("E-", Mode::Minor),
    ("E-", Mode::Major),
    ("E", Mode::Minor),
    ("E", Mode::Major),
    ("F", Mode::Minor),
    ("F", Mode::Major),
    ("F#", Mode::Minor),
    ("F#", Mode::Major),
    ("G-", Mode::Major),
    ("G", Mode::Minor),
    ("G", Mode::Major),
    ("G#", Mode::Minor),
];

fn is_skip(a: &Event, b: &Event) -> bool {
    let iv = Interval::between(a.pitch, b.pitch);
    !iv.is_step() && !iv.is_unison()
}

fn leap_pairs(part: &Part) -> Vec<(Pitch, Pitch)> {
    part.events
        .windows(2)
        .filter(|w| is_skip(&w[0], &w[1]))
        .map(|w| (w[0].pitch, w[1].pitch))
        .collect()
}

/// The weak leap test: every leap must include at least one triad pitch.
fn leap_test_weak(pairs: &[(i32, i32)], triad: &BTreeSet<i32>) -> bool {
    pairs
        .iter()
        .all(|(a, b)| triad.contains(a) || triad.contains(b))
}

fn exempt_from_leap_test(part: &Part) -> bool {
    !matches!(part.species, Species::First | Species::Second | Species::Fourth)
}

/// Per-part key candidates from the scale/terminal/leap filter, spelled
/// from the part's first pitch.
fn part_keys_from_scale(part: &Part) -> Vec<Key> {
    let residues: BTreeSet<i32> = part.events.iter().map(|e| e.pitch.chroma()).collect();
    let first = part.events[0].pitch;
    let residue_init = first.chroma();
    let residue_fin = part.events.last().unwrap().pitch.chroma();
    let leap_residues: Vec<(i32, i32)> = leap_pairs(part)
        .iter()
        .map(|(a, b)| (a.chroma(), b.chroma()))
        .collect();

    let mut candidates = Vec::new();
    for n in 0..12 {
        for mode in [Mode::Minor, Mode::Major] {
            let (scale_semis, triad_semis): (&[i32], &[i32]) = match mode {
                // Union of ascending and descending melodic minor.
                Mode::Minor => (&[0, 2, 3, 5, 7, 8, 9, 10, 11], &MINOR_TRIAD),
                Mode::Major => (&MAJOR_SEMIS, &MAJOR_TRIAD),
            };
            let scale: BTreeSet<i32> = scale_semis.iter().map(|d| (d + n) % 12).collect();
            let triad: BTreeSet<i32> = triad_semis.iter().map(|d| (d + n) % 12).collect();
            let terminals = triad.contains(&residue_init) && triad.contains(&residue_fin);
            let scalars = residues.is_subset(&scale);
            let leaps = exempt_from_leap_test(part) || leap_test_weak(&leap_residues, &triad);
            if !(terminals && scalars && leaps) {
                continue;
            }
            // Recover the diatonic spelling of the tonic from the first
            // pitch of the line, which the terminals test has shown to be
            // a triad member.
            let tonic = if residue_init == n {
                Some(first.class())
            } else if mode == Mode::Minor && residue_init == (n + 3) % 12 {
                Some(first.class().transpose(Interval::MINOR_THIRD.down()))
            } else if mode == Mode::Major && residue_init == (n + 4) % 12 {
                Some(first.class().transpose(Interval::MAJOR_THIRD.down()))
            } else if residue_init == (n + 7) % 12 {
                Some(first.class().transpose(Interval::PERFECT_FIFTH.down()))
            } else {
                None
            };
            if let Some(tonic) = tonic {
                candidates.push(Key::new(tonic, mode));
            }
        }
    }
    candidates
}

/// Pitches not closed off by a later same-pitch or stepwise successor,
/// collected from the end of the line backwards.
fn hanging_notes(part: &Part) -> Vec<PitchClass> {
    let mut hanging: Vec<PitchClass> = Vec::new();
    let mut displaced: BTreeSet<Letter> = BTreeSet::new();
    for event in part.events.iter().rev() {
        let pc = event.pitch.class();
        let neighbors = [
            Letter::from_step(pc.letter.step() - 1),
            Letter::from_step(pc.letter.step() + 1),
        ];
        if !hanging.contains(&pc) && !displaced.contains(&pc.letter) {
            hanging.push(pc);
            displaced.extend(neighbors);
        } else if displaced.contains(&pc.letter) {
            displaced.extend(neighbors);
        }
    }
    hanging
}

/// Key candidates whose tonic triad covers the hanging notes, as
/// (chroma, mode) pairs.
fn part_keys_from_hanging(part: &Part) -> BTreeSet<(i32, Mode)> {
    let hanging: BTreeSet<i32> = hanging_notes(part).iter().map(|pc| pc.chroma()).collect();
    let mut candidates = BTreeSet::new();
    for n in 0..12 {
        for (mode, triad_semis) in [(Mode::Minor, &MINOR_TRIAD), (Mode::Major, &MAJOR_TRIAD)] {
            let triad: BTreeSet<i32> = triad_semis.iter().map(|d| (d + n) % 12).collect();
            if hanging.is_subset(&triad) {
                candidates.insert((n, mode));
            }
        }
    }
    candidates
}

/// Infer a key from the parts of a score.
pub fn infer_key(score: &Score) -> anyhow::Result<Key> {
    let mut survivors: Option<Vec<Key>> = None;
    for part in &score.parts {
        let from_scale = part_keys_from_scale(part);
        if from_scale.is_empty() {
            bail!("Unable to derive a key from one or more of the parts.");
        }
        let from_hanging = part_keys_from_hanging(part);
        let part_keys: Vec<Key> = from_scale
            .into_iter()
            .filter(|k| from_hanging.contains(&(k.tonic.chroma(), k.mode)))
            .collect();
        survivors = Some(match survivors {
            None => part_keys,
            Some(prev) => prev.into_iter().filter(|k| part_keys.contains(k)).collect(),
        });
    }
    let mut candidates = survivors.unwrap_or_default();

    // Prefer keys in which most lines end on the tonic degree, then keys
    // in which some lines begin on it.
    let terminals: [fn(&Part) -> PitchClass; 2] = [
        |part| part.events.last().unwrap().pitch.class(),
        |part| part.events[0].pitch.class(),
    ];
    for terminal in terminals {
        if candidates.len() > 1 {
            let weighted: Vec<(Key, usize)> = candidates
                .iter()
                .map(|k| {
                    let w = score
                        .parts
                        .iter()
                        .filter(|p| terminal(p) == k.tonic)
                        .count();
                    (*k, w)
                })
                .collect();
            let strong: Vec<Key> = weighted
                .iter()
                .filter(|(_, w)| *w > 0)
                .map(|(k, _)| *k)
                .collect();
            if strong.len() == 1 {
                candidates = strong;
            }
        }
    }

    match candidates.len() {
        1 => Ok(candidates[0]),
        0 => bail!("No viable key inferrable from this score."),
        2 => {
            let (a, b) = (candidates[0], candidates[1]);
            // Ambiguous between modes only: prefer major.
            if a.tonic == b.tonic {
                Ok(Key::new(a.tonic, Mode::Major))
            } else {
                bail!("Two keys are possible for this score: {a} and {b}.")
            }
        }
        _ => bail!("More than two keys are possible for this score."),
    }
}

/// Validate a key supplied by the user and test it against the score.
pub fn validate_key(score: &Score, tonic: PitchClass, mode: Mode) -> anyhow::Result<Key> {
    let valid = VALID_KEYS
        .iter()
        .any(|(name, m)| *m == mode && tonic.to_string() == *name);
    if !valid {
        bail!("The user-selected key ({tonic} {mode}) is not a valid key.");
    }
    let key = Key::new(tonic, mode);
    let triad = key.tonic_triad();
    let mut report = String::new();
    for part in &score.parts {
        let mut part_errors = String::new();
        let first = part.events[0].pitch.class();
        let last = part.events.last().unwrap().pitch.class();
        if !triad.contains(&first) {
            part_errors += "\n\tThe first note is not a triad pitch.";
        }
        if !triad.contains(&last) {
            part_errors += "\n\tThe last note is not a triad pitch.";
        }
        let nonscalars = part
            .events
            .iter()
            .filter(|e| !key.contains(e.pitch.class()))
            .count();
        match nonscalars {
            0 => {}
            1 => part_errors += "\n\tOne note in the line does not belong to the scale.",
            n => {
                part_errors +=
                    &format!("\n\t{n} notes in the line do not belong to the scale.");
            }
        }
        if !exempt_from_leap_test(part) {
            let pairs: Vec<(i32, i32)> = leap_pairs(part)
                .iter()
                .map(|(a, b)| (a.chroma(), b.chroma()))
                .collect();
            let triad_residues: BTreeSet<i32> = triad.iter().map(|pc| pc.chroma()).collect();
            if !leap_test_weak(&pairs, &triad_residues) {
                part_errors += "\n\tAt least one leap fails to include a triad pitch.";
            }
        }
        if !part_errors.is_empty() {
            report += &format!(
                "Problems found in {}. Given key = {tonic} {mode}{part_errors}",
                part.name
            );
        }
    }
    if !report.is_empty() {
        bail!("{report}");
    }
    Ok(key)
}
