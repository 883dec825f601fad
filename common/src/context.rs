//! The global context: everything the parser and the checker need to
//! know about a score before analysis starts. Building it resolves the
//! key (user-supplied or inferred), registers a tonic in each part's
//! register, assigns concrete scale degrees and consecutions, and for
//! florid species derives the local harmony of each measure.

use crate::consecutions::{Consecutions, consecutions};
use crate::csd::{Csd, csd};
use crate::key::{Key, Mode, infer_key, validate_key};
use crate::pitch::{Interval, Pitch, PitchClass};
use crate::score::{Event, Part, Score, Species, Time};
use anyhow::bail;
use std::collections::BTreeSet;

#[derive(Debug)]
pub struct PartContext {
    pub part: Part,
    /// The tonic pitch anchoring scale-degree values, registered within
    /// (or just below) the part's range.
    pub tonic: Pitch,
    pub csds: Vec<Csd>,
    pub cons: Vec<Consecutions>,
}

impl PartContext {
    pub fn events(&self) -> &[Event] {
        &self.part.events
    }

    pub fn species(&self) -> Species {
        self.part.species
    }

    pub fn name(&self) -> &str {
        &self.part.name
    }
}

#[derive(Debug)]
pub struct GlobalContext {
    pub title: String,
    pub bar: Time,
    pub measure_count: usize,
    pub key: Key,
    pub key_from_user: bool,
    pub parts: Vec<PartContext>,
    /// Per-measure harmonic essentials (index 0 is measure 1); only
    /// derived when a florid part needs them.
    pub local_harmonies: Vec<Vec<PitchClass>>,
}

impl GlobalContext {
    pub fn new(
        score: Score,
        keynote: Option<PitchClass>,
        mode: Option<Mode>,
    ) -> anyhow::Result<GlobalContext> {
        let (key, key_from_user) = match (keynote, mode) {
            (Some(k), Some(m)) => (validate_key(&score, k, m)?, true),
            _ => (infer_key(&score)?, false),
        };

        let mut parts = Vec::new();
        for part in score.parts {
            let tonic = registral_tonic(&part, &key);
            let mut csds = Vec::new();
            for event in &part.events {
                csds.push(csd(event.pitch, &key, tonic)?);
            }
            let cons = consecutions(&part.events);
            parts.push(PartContext {
                part,
                tonic,
                csds,
                cons,
            });
        }

        let needs_local = parts
            .iter()
            .any(|p| matches!(p.species(), Species::Third | Species::Fifth));
        let local_harmonies = if needs_local {
            derive_local_harmonies(&parts, score.measure_count)?
        } else {
            Vec::new()
        };

        Ok(GlobalContext {
            title: score.title,
            bar: score.bar,
            measure_count: score.measure_count,
            key,
            key_from_user,
            parts,
            local_harmonies,
        })
    }

    /// The harmonic essentials of a measure (1-based), if derived.
    pub fn local_harmony(&self, measure: usize) -> Option<&[PitchClass]> {
        self.local_harmonies.get(measure - 1).map(|v| v.as_slice())
    }
}

/// Find the lowest tonic degree within the part's register, or failing
/// that the nearest tonic below it.
fn registral_tonic(part: &Part, key: &Key) -> Pitch {
    let min = part.events.iter().map(|e| e.pitch).min().unwrap();
    let max = part.events.iter().map(|e| e.pitch).max().unwrap();
    for octave in 0..=8 {
        let t = key.tonic.in_octave(octave);
        if min <= t && t <= max {
            return t;
        }
    }
    for octave in (0..=8).rev() {
        let t = key.tonic.in_octave(octave);
        if t < min {
            return t;
        }
    }
    key.tonic.in_octave(0)
}

/// Two pitch classes that can sound together inside one triad.
fn is_triadic_consonance(a: PitchClass, b: PitchClass) -> bool {
    let ic = (a.chroma() - b.chroma()).rem_euclid(12);
    matches!(ic, 0 | 3 | 4 | 5 | 7 | 8 | 9)
}

/// Whether a collection of pitch classes fits inside a single major or
/// minor triad.
pub fn is_triadic_set(pcs: &[PitchClass]) -> bool {
    let chromas: BTreeSet<i32> = pcs.iter().map(|pc| pc.chroma()).collect();
    if chromas.len() <= 1 {
        return true;
    }
    for root in 0..12 {
        for third in [3, 4] {
            let triad: BTreeSet<i32> =
                [root, (root + third) % 12, (root + 7) % 12].into_iter().collect();
            if chromas.is_subset(&triad) {
                return true;
            }
        }
    }
    false
}

/// Derive the active triad of each measure from the pitches sounding on
/// its downbeat, folding in the stepwise resolutions of tied-over
/// dissonances. Non-triadic measures are a fatal context error.
fn derive_local_harmonies(
    parts: &[PartContext],
    measure_count: usize,
) -> anyhow::Result<Vec<Vec<PitchClass>>> {
    let mut harmonies = Vec::new();
    let mut bad_measures = Vec::new();
    for m in 1..=measure_count {
        let mut essentials: Vec<PitchClass> = Vec::new();
        let mut carried: Vec<(&PartContext, &Event)> = Vec::new();
        for p in parts {
            if let Some(e) = p.part.downbeat(m) {
                if e.tied_from_prev {
                    carried.push((p, e));
                } else {
                    essentials.push(e.pitch.class());
                }
            }
        }
        // A tied-over note joins the harmony if it is consonant with it;
        // otherwise its stepwise resolution does.
        for (p, e) in carried {
            if essentials
                .iter()
                .all(|pc| is_triadic_consonance(*pc, e.pitch.class()))
            {
                essentials.push(e.pitch.class());
            } else if let Some(res) = p.events().iter().find(|r| {
                r.measure == m
                    && r.index > e.index
                    && Interval::between(e.pitch, r.pitch).is_step()
                    && r.pitch < e.pitch
            }) {
                essentials.push(res.pitch.class());
            }
        }
        if !is_triadic_set(&essentials) {
            bad_measures.push(m.to_string());
        }
        harmonies.push(essentials);
    }
    if !bad_measures.is_empty() {
        bail!(
            "Counterpoint Error: The following measures contain non-triadic \
             sonorities: {}.",
            bad_measures.join(", ")
        );
    }
    Ok(harmonies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch::parse_pitch_class;
    use crate::test_helpers::{first_species, score_from_measures, two_parts};

    #[test]
    fn test_context_build() {
        let score = first_species(&["C4", "D4", "E4", "D4", "C4"]);
        let ctx = GlobalContext::new(score, None, None).unwrap();
        assert_eq!(ctx.key.to_string(), "C major");
        assert!(!ctx.key_from_user);
        let p = &ctx.parts[0];
        assert_eq!(p.tonic, Pitch::must_parse("C4"));
        assert_eq!(p.csds.iter().map(|c| c.value).collect::<Vec<_>>(), vec![
            0, 1, 2, 1, 0
        ]);
    }

    #[test]
    fn test_registral_tonic_below_range() {
        // A line that sits above its tonic degree: E4..G4 in C major.
        let score = two_parts(&["E4", "F4", "G4", "F4", "E4"], &["C3", "G3", "C3"]);
        let ctx = GlobalContext::new(score, None, None).unwrap();
        // No C inside E4..G4, so the tonic registers below the part.
        assert_eq!(ctx.parts[0].tonic, Pitch::must_parse("C4"));
    }

    #[test]
    fn test_user_key() {
        let score = first_species(&["C4", "D4", "E4", "D4", "C4"]);
        let ctx = GlobalContext::new(
            score,
            Some(parse_pitch_class("C").unwrap()),
            Some(Mode::Major),
        )
        .unwrap();
        assert!(ctx.key_from_user);
    }

    #[test]
    fn test_triadic_sets() {
        let pc = |s: &str| parse_pitch_class(s).unwrap();
        assert!(is_triadic_set(&[pc("C"), pc("E"), pc("G")]));
        assert!(is_triadic_set(&[pc("C"), pc("E-"), pc("G")]));
        assert!(is_triadic_set(&[pc("C"), pc("G")]));
        assert!(is_triadic_set(&[pc("C")]));
        assert!(!is_triadic_set(&[pc("C"), pc("D"), pc("G")]));
        assert!(!is_triadic_set(&[pc("C"), pc("E"), pc("G"), pc("B")]));
    }

    #[test]
    fn test_local_harmonies() {
        // Third species upper part over a first species bass.
        let score = score_from_measures(vec![
            vec![
                vec!["E4", "F4", "G4", "A4"],
                vec!["F4", "E4", "D4", "E4"],
                vec!["C4"],
            ],
            vec![vec!["C3"], vec!["D3"], vec!["C3"]],
        ]);
        let ctx = GlobalContext::new(score, None, None).unwrap();
        assert_eq!(ctx.local_harmonies.len(), 3);
        let pc = |s: &str| parse_pitch_class(s).unwrap();
        assert_eq!(ctx.local_harmonies[0], vec![pc("E"), pc("C")]);
        assert_eq!(ctx.local_harmonies[1], vec![pc("F"), pc("D")]);
    }
}
