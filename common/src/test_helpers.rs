//! Helpers for building scores concisely in tests.

use crate::pitch::Pitch;
use crate::score::{EventInput, PartInput, Score, ScoreInput};

/// Build a score from pitch names grouped as parts of measures, e.g.
/// `vec![vec![vec!["C4", "E4"], vec!["D4"]]]`. Durations are shared
/// evenly within each measure.
pub fn score_from_measures(parts: Vec<Vec<Vec<&str>>>) -> Score {
    let input = ScoreInput {
        title: None,
        bar: None,
        parts: parts
            .into_iter()
            .map(|measures| PartInput {
                name: None,
                measures: measures
                    .into_iter()
                    .map(|m| {
                        m.into_iter()
                            .map(|s| EventInput::Name(Pitch::must_parse(s)))
                            .collect()
                    })
                    .collect(),
            })
            .collect(),
    };
    Score::from_input(input).unwrap()
}

/// A single first-species part: one note per measure.
pub fn first_species(notes: &[&str]) -> Score {
    score_from_measures(vec![notes.iter().map(|n| vec![*n]).collect()])
}

/// Two first-species parts, upper then lower.
pub fn two_parts(upper: &[&str], lower: &[&str]) -> Score {
    score_from_measures(vec![
        upper.iter().map(|n| vec![*n]).collect(),
        lower.iter().map(|n| vec![*n]).collect(),
    ])
}
