//! Melodic consecutions: how each note in a line is approached and left.
//! The parser and the voice-leading checker both classify elaborations
//! and motions from these.

use crate::pitch::Interval;
use crate::score::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsecutionType {
    Step,
    Skip,
    Same,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Consecutions {
    pub left: Option<ConsecutionType>,
    pub right: Option<ConsecutionType>,
    /// Signed direction of the approach/departure: -1, 0, or 1.
    pub left_dir: i32,
    pub right_dir: i32,
}

impl Consecutions {
    pub fn approached_by_step(&self) -> bool {
        self.left == Some(ConsecutionType::Step)
    }

    pub fn left_by_step(&self) -> bool {
        self.right == Some(ConsecutionType::Step)
    }
}

pub fn classify(a: &Event, b: &Event) -> (ConsecutionType, i32) {
    let iv = Interval::between(a.pitch, b.pitch);
    let t = if iv.is_step() {
        ConsecutionType::Step
    } else if iv.is_unison() {
        ConsecutionType::Same
    } else {
        ConsecutionType::Skip
    };
    (t, iv.direction())
}

/// Compute the consecutions of every event in a line.
pub fn consecutions(events: &[Event]) -> Vec<Consecutions> {
    let mut out = vec![Consecutions::default(); events.len()];
    for i in 0..events.len().saturating_sub(1) {
        let (t, dir) = classify(&events[i], &events[i + 1]);
        out[i].right = Some(t);
        out[i].right_dir = dir;
        out[i + 1].left = Some(t);
        out[i + 1].left_dir = dir;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::first_species;

    #[test]
    fn test_consecutions() {
        let score = first_species(&["C4", "D4", "E4", "G3", "G3", "C4"]);
        let cons = consecutions(&score.parts[0].events);
        assert_eq!(cons[0].left, None);
        assert_eq!(cons[0].right, Some(ConsecutionType::Step));
        assert_eq!(cons[1].left, Some(ConsecutionType::Step));
        assert_eq!(cons[1].left_dir, 1);
        assert_eq!(cons[2].right, Some(ConsecutionType::Skip));
        assert_eq!(cons[2].right_dir, -1);
        assert_eq!(cons[3].right, Some(ConsecutionType::Same));
        assert_eq!(cons[4].right, Some(ConsecutionType::Skip));
        assert_eq!(cons[5].right, None);
    }
}
