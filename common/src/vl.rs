//! The voice-leading checker: walks aligned pairs of parts and reports
//! rule violations. It is purely diagnostic; nothing in the score is
//! modified, and every pair of parts is checked independently, so
//! adding a part can only add findings, never remove them.

use crate::context::{GlobalContext, PartContext};
use crate::pitch::{Interval, Pitch};
use crate::score::{Event, Species, Time};
use serde::Serialize;

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Indices of the parts involved, top-down.
    pub parts: Vec<usize>,
    /// 1-based measure numbers involved.
    pub measures: Vec<usize>,
    pub message: String,
}

/// A verticality: the events of two parts sounding at one onset.
#[derive(Debug, Clone, Copy)]
struct VPair<'a> {
    offset: Time,
    upper: &'a Event,
    lower: &'a Event,
}

impl VPair<'_> {
    fn interval(&self) -> Interval {
        Interval::between(self.lower.pitch, self.upper.pitch)
    }

    fn upper_attacks(&self) -> bool {
        self.upper.offset == self.offset && !self.upper.tied_from_prev
    }

    fn lower_attacks(&self) -> bool {
        self.lower.offset == self.offset && !self.lower.tied_from_prev
    }

    fn measure(&self) -> usize {
        self.upper.measure.max(self.lower.measure)
    }
}

fn sounding_at(part: &PartContext, t: Time) -> Option<&Event> {
    part.events()
        .iter()
        .rev()
        .find(|e| e.offset <= t && t < e.offset + e.duration)
}

fn vpairs<'a>(upper: &'a PartContext, lower: &'a PartContext) -> Vec<VPair<'a>> {
    let mut offsets: Vec<Time> = upper
        .events()
        .iter()
        .chain(lower.events())
        .map(|e| e.offset)
        .collect();
    offsets.sort();
    offsets.dedup();
    offsets
        .into_iter()
        .filter_map(|t| {
            let u = sounding_at(upper, t)?;
            let l = sounding_at(lower, t)?;
            Some(VPair {
                offset: t,
                upper: u,
                lower: l,
            })
        })
        .collect()
}

/// Permissible vertical consonances above the bass.
fn is_consonance_above_bass(iv: Interval) -> bool {
    matches!(
        iv.name().as_str(),
        "P1" | "m3" | "M3" | "P5" | "m6" | "M6" | "P8"
    )
}

/// Between upper parts the fourth is consonant as well.
fn is_consonance_between_upper(iv: Interval) -> bool {
    is_consonance_above_bass(iv) || iv.name() == "P4"
}

fn is_perfect(name: &str) -> bool {
    matches!(name, "P1" | "P5" | "P8")
}

fn perfect_name(name: &str) -> &'static str {
    match name {
        "P1" => "unison",
        "P5" => "fifth",
        _ => "octave",
    }
}

/// The melodic consecution of an event within its own part.
fn steps_into(part: &PartContext, e: &Event) -> bool {
    part.cons[e.index].approached_by_step()
}

fn steps_out(part: &PartContext, e: &Event) -> bool {
    part.cons[e.index].left_by_step()
}

struct DuetChecker<'a> {
    upper_idx: usize,
    lower_idx: usize,
    upper: &'a PartContext,
    lower: &'a PartContext,
    includes_bass: bool,
    violations: Vec<Violation>,
}

impl DuetChecker<'_> {
    fn report(&mut self, measures: Vec<usize>, message: String) {
        let v = Violation {
            parts: vec![self.upper_idx, self.lower_idx],
            measures,
            message,
        };
        if !self.violations.contains(&v) {
            self.violations.push(v);
        }
    }

    fn consonant(&self, iv: Interval) -> bool {
        if self.includes_bass {
            is_consonance_above_bass(iv)
        } else {
            is_consonance_between_upper(iv)
        }
    }

    fn check(&mut self) {
        let pairs = vpairs(self.upper, self.lower);
        self.check_dissonance_control(&pairs);
        self.check_motions(&pairs);
        self.check_crossing_and_overlap(&pairs);
        self.check_cross_relations(&pairs);
    }

    /// On the beat: consonance. Off the beat: dissonance only when
    /// approached and left by step. Tied-over dissonances resolve down
    /// by step.
    fn check_dissonance_control(&mut self, pairs: &[VPair]) {
        for vp in pairs {
            let iv = vp.interval();
            if self.consonant(iv) {
                continue;
            }
            let suspension = vp.upper.tied_from_prev || vp.lower.tied_from_prev;
            if suspension {
                // The syncopated voice must fall by step at its next
                // attack.
                let (part, e) = if vp.upper.tied_from_prev {
                    (self.upper, vp.upper)
                } else {
                    (self.lower, vp.lower)
                };
                let resolved = part
                    .events()
                    .get(e.index + 1)
                    .map(|next| {
                        let step = Interval::between(e.pitch, next.pitch);
                        step.is_step() && next.pitch < e.pitch
                    })
                    .unwrap_or(false);
                if !resolved {
                    self.report(
                        vec![e.measure],
                        format!(
                            "The dissonant syncopation in bar {} is not resolved by \
                             downward step.",
                            e.measure
                        ),
                    );
                }
                continue;
            }
            if vp.upper_attacks() && vp.lower_attacks() {
                self.report(
                    vec![vp.measure()],
                    format!(
                        "Dissonance between co-initiated notes in bar {}: {}.",
                        vp.measure(),
                        iv.name()
                    ),
                );
                continue;
            }
            // One voice moved against the other: the moving note must be
            // a passing or neighboring tone, approached and left by
            // step.
            let (part, e) = if vp.upper_attacks() {
                (self.upper, vp.upper)
            } else {
                (self.lower, vp.lower)
            };
            if !(steps_into(part, e) && steps_out(part, e)) {
                self.report(
                    vec![e.measure],
                    format!(
                        "Dissonant interval off the beat that is not approached \
                         and left by step in bar {}: {}.",
                        e.measure,
                        iv.name()
                    ),
                );
            }
        }
    }

    /// Parallel and similar motion into perfect intervals, both between
    /// consecutive attacks and from downbeat to downbeat in the florid
    /// species.
    fn check_motions(&mut self, pairs: &[VPair]) {
        for w in pairs.windows(2) {
            let (v1, v2) = (w[0], w[1]);
            // A suspension bridges the attack; fourth-species syncopes
            // are judged at their resolutions instead.
            if v2.upper.tied_from_prev || v2.lower.tied_from_prev {
                continue;
            }
            self.check_motion_pair(v1, v2);
        }
        // Downbeat-to-downbeat motion with intervening tones does not
        // excuse parallels in second and third species.
        let florid = !matches!(
            (self.upper.species(), self.lower.species()),
            (Species::First, Species::First)
        );
        if florid {
            let downbeats: Vec<VPair> = pairs
                .iter()
                .copied()
                .filter(|vp| vp.upper.on_downbeat() && vp.lower.on_downbeat())
                .collect();
            for w in downbeats.windows(2) {
                let (v1, v2) = (w[0], w[1]);
                let iv1 = v1.interval().name();
                let iv2 = v2.interval().name();
                if iv1 == iv2
                    && is_perfect(&iv2)
                    && v1.upper.pitch != v2.upper.pitch
                    && v1.lower.pitch != v2.lower.pitch
                {
                    self.report(
                        vec![v1.measure(), v2.measure()],
                        format!(
                            "Forbidden parallel motion to {} from the downbeat of \
                             bar {} to the downbeat of bar {}.",
                            perfect_name(&iv2),
                            v1.measure(),
                            v2.measure()
                        ),
                    );
                }
            }
        }
    }

    fn check_motion_pair(&mut self, v1: VPair, v2: VPair) {
        let upper_moved = v1.upper.pitch != v2.upper.pitch;
        let lower_moved = v1.lower.pitch != v2.lower.pitch;
        if !(upper_moved && lower_moved) {
            return;
        }
        let iv2 = v2.interval().name();
        if !is_perfect(&iv2) {
            return;
        }
        let iv1 = v1.interval().name();
        let up_dir = (v2.upper.pitch.ps() - v1.upper.pitch.ps()).signum();
        let low_dir = (v2.lower.pitch.ps() - v1.lower.pitch.ps()).signum();
        if up_dir != low_dir {
            return;
        }
        let m = v2.measure();
        if iv1 == iv2 {
            self.report(
                vec![m],
                format!(
                    "Forbidden parallel motion to {} going into bar {m}.",
                    perfect_name(&iv2)
                ),
            );
            return;
        }
        // Similar (hidden) motion into a perfect interval: the unison is
        // always forbidden; fifths and octaves are forbidden when the
        // upper voice leaps.
        let upper_leap = !Interval::between(v1.upper.pitch, v2.upper.pitch).is_step();
        if iv2 == "P1" || upper_leap {
            self.report(
                vec![m],
                format!(
                    "Forbidden similar motion to {} going into bar {m}.",
                    perfect_name(&iv2)
                ),
            );
        }
    }

    fn check_crossing_and_overlap(&mut self, pairs: &[VPair]) {
        for vp in pairs {
            if vp.upper.pitch < vp.lower.pitch {
                self.report(
                    vec![vp.measure()],
                    format!("Voice crossing in bar {}.", vp.measure()),
                );
            }
        }
        for w in pairs.windows(2) {
            let (v1, v2) = (w[0], w[1]);
            let overlap = (v2.upper_attacks() && v2.upper.pitch < v1.lower.pitch)
                || (v2.lower_attacks() && v2.lower.pitch > v1.upper.pitch);
            if overlap {
                self.report(
                    vec![v2.measure()],
                    format!("Voice overlap going into bar {}.", v2.measure()),
                );
            }
        }
    }

    /// A chromatic conflict between the voices across consecutive
    /// attacks: the same letter under different inflections.
    fn check_cross_relations(&mut self, pairs: &[VPair]) {
        for w in pairs.windows(2) {
            let (v1, v2) = (w[0], w[1]);
            let cross = |a: Pitch, b: Pitch| {
                a.letter == b.letter && a.alter != b.alter && a.class() != b.class()
            };
            if cross(v1.upper.pitch, v2.lower.pitch) || cross(v1.lower.pitch, v2.upper.pitch) {
                self.report(
                    vec![v2.measure()],
                    format!("Cross relation going into bar {}.", v2.measure()),
                );
            }
        }
    }
}

/// Melodic checks within a single part: repetitions, ties, and leap
/// quality.
fn check_melodic(ctx: &GlobalContext, idx: usize, violations: &mut Vec<Violation>) {
    let part = &ctx.parts[idx];
    let mut report = |measures: Vec<usize>, message: String| {
        let v = Violation {
            parts: vec![idx],
            measures,
            message,
        };
        if !violations.contains(&v) {
            violations.push(v);
        }
    };
    let events = part.events();
    for w in events.windows(2) {
        let (a, b) = (&w[0], &w[1]);
        let iv = Interval::between(a.pitch, b.pitch);
        if a.tied_to_next {
            if !iv.is_unison() {
                report(
                    vec![b.measure],
                    format!("Pitch not tied across the barline into bar {}.", b.measure),
                );
            }
            continue;
        }
        if iv.is_unison() {
            if matches!(
                part.species(),
                Species::Second | Species::Third | Species::Fourth
            ) {
                report(
                    vec![b.measure],
                    format!("Direct repetition in bar {}.", b.measure),
                );
            }
            continue;
        }
        if !iv.is_step() && !iv.is_linear_consonance() {
            report(
                vec![b.measure],
                format!(
                    "Forbidden melodic interval of a {} in bar {}.",
                    iv.name(),
                    b.measure
                ),
            );
        }
    }
}

/// Rising fourths in the bass may not imply a six-four sonority: when
/// the lower note of the fourth sounds, no upper voice may expose the
/// fourth and sixth above it.
fn check_fourth_leaps_in_bass(ctx: &GlobalContext, violations: &mut Vec<Violation>) {
    if ctx.parts.len() < 2 {
        return;
    }
    let bass_idx = ctx.parts.len() - 1;
    let bass = &ctx.parts[bass_idx];
    for w in bass.events().windows(2) {
        let (a, b) = (&w[0], &w[1]);
        let iv = Interval::between(a.pitch, b.pitch);
        if !(iv.name() == "P4" && iv.direction() > 0) {
            continue;
        }
        let mut has_fourth = false;
        let mut has_sixth = false;
        for upper in &ctx.parts[..bass_idx] {
            if let Some(e) = sounding_at(upper, a.offset) {
                match Interval::between(a.pitch, e.pitch).name().as_str() {
                    "P4" | "A4" => has_fourth = true,
                    "m6" | "M6" => has_sixth = true,
                    _ => {}
                }
            }
        }
        if has_fourth && has_sixth {
            let v = Violation {
                parts: vec![bass_idx],
                measures: vec![a.measure, b.measure],
                message: format!(
                    "The fourth leap in the bass in bars {} to {} implies a \
                     six-four sonority.",
                    a.measure, b.measure
                ),
            };
            if !violations.contains(&v) {
                violations.push(v);
            }
        }
    }
}

/// Check the counterpoint of every pair of parts in the context.
pub fn check_counterpoint(ctx: &GlobalContext) -> Vec<Violation> {
    let mut violations = Vec::new();
    for idx in 0..ctx.parts.len() {
        check_melodic(ctx, idx, &mut violations);
    }
    for a in 0..ctx.parts.len() {
        for b in a + 1..ctx.parts.len() {
            let mut checker = DuetChecker {
                upper_idx: a,
                lower_idx: b,
                upper: &ctx.parts[a],
                lower: &ctx.parts[b],
                includes_bass: b == ctx.parts.len() - 1,
                violations: Vec::new(),
            };
            checker.check();
            for v in checker.violations {
                if !violations.contains(&v) {
                    violations.push(v);
                }
            }
        }
    }
    check_fourth_leaps_in_bass(ctx, &mut violations);
    violations
}

#[cfg(test)]
mod tests;
