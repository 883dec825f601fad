//! The score input model: ordered parts of pitched events grouped in
//! measures. This is the narrow interface through which scores reach the
//! analysis core; importing from notation formats is someone else's job.

use crate::pitch::Pitch;
use anyhow::bail;
use num_rational::Ratio;
use serde::de::Visitor;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::fmt;
use std::fmt::{Display, Formatter};

/// Musical time in quarter notes.
pub type Time = Ratio<i64>;

/// A duration in quarter notes. Accepts a JSON integer or an "n/d"
/// string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Dur(pub Time);

impl Serialize for Dur {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if self.0.is_integer() {
            serializer.serialize_i64(self.0.to_integer())
        } else {
            serializer.collect_str(&format!("{}/{}", self.0.numer(), self.0.denom()))
        }
    }
}

impl<'de> Deserialize<'de> for Dur {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DurVisitor;

        impl Visitor<'_> for DurVisitor {
            type Value = Dur;

            fn expecting(&self, formatter: &mut Formatter) -> fmt::Result {
                formatter.write_str("a duration in quarter notes: an integer or \"n/d\"")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(Dur(Time::from_integer(v as i64)))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(Dur(Time::from_integer(v)))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                let parts: Vec<&str> = v.split('/').collect();
                let err = || E::custom(format!("'{v}' is not a duration"));
                match parts.as_slice() {
                    [n] => n
                        .parse::<i64>()
                        .map(|n| Dur(Time::from_integer(n)))
                        .map_err(|_| err()),
                    [n, d] => {
                        let n = n.parse::<i64>().map_err(|_| err())?;
                        let d = d.parse::<i64>().map_err(|_| err())?;
                        if d == 0 {
                            return Err(err());
                        }
                        Ok(Dur(Time::new(n, d)))
                    }
                    _ => Err(err()),
                }
            }
        }

        deserializer.deserialize_any(DurVisitor)
    }
}

/// One event as written in the input: either a bare pitch name or a full
/// record with duration and tie.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EventInput {
    Name(Pitch),
    Full {
        pitch: Pitch,
        #[serde(default)]
        duration: Option<Dur>,
        #[serde(default)]
        tied: bool,
    },
}

impl EventInput {
    fn pitch(&self) -> Pitch {
        match self {
            EventInput::Name(p) => *p,
            EventInput::Full { pitch, .. } => *pitch,
        }
    }

    fn duration(&self) -> Option<Time> {
        match self {
            EventInput::Name(_) => None,
            EventInput::Full { duration, .. } => duration.map(|d| d.0),
        }
    }

    fn tied(&self) -> bool {
        match self {
            EventInput::Name(_) => false,
            EventInput::Full { tied, .. } => *tied,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartInput {
    #[serde(default)]
    pub name: Option<String>,
    pub measures: Vec<Vec<EventInput>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoreInput {
    #[serde(default)]
    pub title: Option<String>,
    /// Bar length in quarter notes; defaults to a whole note.
    #[serde(default)]
    pub bar: Option<Dur>,
    /// Parts ordered top to bottom.
    pub parts: Vec<PartInput>,
}

/// A pitched event with its derived position information.
#[derive(Debug, Clone)]
pub struct Event {
    pub index: usize,
    pub pitch: Pitch,
    /// Onset in quarter notes from the beginning of the score.
    pub offset: Time,
    /// Onset within its measure; zero on the downbeat.
    pub beat: Time,
    pub duration: Time,
    /// 1-based measure number.
    pub measure: usize,
    pub tied_to_next: bool,
    pub tied_from_prev: bool,
}

impl Event {
    pub fn on_downbeat(&self) -> bool {
        self.beat == Time::from_integer(0)
    }
}

/// The rhythmic species of a part, detected from its note-per-measure
/// regularities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Species {
    First,
    Second,
    Third,
    Fourth,
    Fifth,
}

impl Display for Species {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Species::First => "first",
            Species::Second => "second",
            Species::Third => "third",
            Species::Fourth => "fourth",
            Species::Fifth => "fifth",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone)]
pub struct Part {
    /// "Part 1" counted from the top.
    pub name: String,
    pub index: usize,
    pub events: Vec<Event>,
    pub species: Species,
    pub measure_count: usize,
}

impl Part {
    /// The first event sounding in a measure (1-based).
    pub fn downbeat(&self, measure: usize) -> Option<&Event> {
        self.events.iter().find(|e| e.measure == measure)
    }
}

#[derive(Debug, Clone)]
pub struct Score {
    pub title: String,
    pub parts: Vec<Part>,
    pub bar: Time,
    pub measure_count: usize,
}

impl Score {
    pub fn from_input(input: ScoreInput) -> anyhow::Result<Score> {
        if input.parts.is_empty() {
            bail!("The source does not contain any parts.");
        }
        let bar = input.bar.map(|d| d.0).unwrap_or(Time::from_integer(4));
        if bar <= Time::from_integer(0) {
            bail!("The bar length must be positive.");
        }
        let mut parts = Vec::new();
        for (index, part_input) in input.parts.iter().enumerate() {
            let name = part_input
                .name
                .clone()
                .unwrap_or_else(|| format!("Part {}", index + 1));
            let part = build_part(part_input, name, index, bar)?;
            parts.push(part);
        }
        let measure_count = parts.iter().map(|p| p.measure_count).max().unwrap();
        Ok(Score {
            title: input.title.unwrap_or_else(|| "untitled".to_string()),
            parts,
            bar,
            measure_count,
        })
    }

    pub fn from_json(src: &str) -> anyhow::Result<Score> {
        let input: ScoreInput = serde_json::from_str(src)?;
        Score::from_input(input)
    }
}

fn build_part(input: &PartInput, name: String, index: usize, bar: Time) -> anyhow::Result<Part> {
    if input.measures.iter().all(|m| m.is_empty()) {
        bail!("At least one part contains no notes.\nPlease complete the exercise and try again.");
    }
    let mut events: Vec<Event> = Vec::new();
    let mut offset = Time::from_integer(0);
    for (m, measure) in input.measures.iter().enumerate() {
        if measure.is_empty() {
            bail!(
                "At least one measure does not contain enough notes.\n\
                 Please complete the exercise and try again."
            );
        }
        // Events with no written duration share the time the measure has
        // left after the written ones are placed.
        let written: Time = measure.iter().filter_map(|e| e.duration()).sum();
        let unwritten = measure.iter().filter(|e| e.duration().is_none()).count();
        if written > bar {
            bail!(
                "At least one measure contains too many notes.\n\
                 Please revise the exercise and try again."
            );
        }
        if written < bar && unwritten == 0 {
            bail!(
                "At least one measure does not contain enough notes.\n\
                 Please complete the exercise and try again."
            );
        }
        let fill = if unwritten > 0 {
            (bar - written) / Time::from_integer(unwritten as i64)
        } else {
            Time::from_integer(0)
        };
        let mut beat = Time::from_integer(0);
        for e in measure {
            let duration = e.duration().unwrap_or(fill);
            events.push(Event {
                index: events.len(),
                pitch: e.pitch(),
                offset,
                beat,
                duration,
                measure: m + 1,
                tied_to_next: e.tied(),
                tied_from_prev: false,
            });
            offset += duration;
            beat += duration;
        }
    }
    if input.measures.last().map(|m| m.len()) != Some(1) {
        bail!(
            "The final measure contains too many notes.\n\
             Please revise the exercise and try again."
        );
    }
    for i in 0..events.len() {
        if events[i].tied_to_next {
            if i + 1 == events.len() {
                bail!(
                    "The final note has a tie but nothing follows.\n\
                     Please revise the exercise and try again."
                );
            }
            events[i + 1].tied_from_prev = true;
        }
    }
    let species = assign_species(input);
    Ok(Part {
        name,
        index,
        events,
        species,
        measure_count: input.measures.len(),
    })
}

/// Determine the species from the rhythmic regularities of the interior
/// measures (the first and last measures are free).
fn assign_species(input: &PartInput) -> Species {
    let n = input.measures.len();
    let interior: &[Vec<EventInput>] = if n > 2 {
        &input.measures[1..n - 1]
    } else {
        &input.measures[..n.saturating_sub(1)]
    };
    if interior.is_empty() {
        return Species::First;
    }
    let counts: Vec<usize> = interior.iter().map(|m| m.len()).collect();
    if counts.iter().all(|&c| c == 1) {
        Species::First
    } else if counts.iter().all(|&c| c == 2) {
        // Syncopated ties across the barline mark fourth species.
        if interior
            .iter()
            .any(|m| m.last().map(|e| e.tied()).unwrap_or(false))
        {
            Species::Fourth
        } else {
            Species::Second
        }
    } else if counts.iter().all(|&c| c == 3 || c == 4) {
        Species::Third
    } else {
        Species::Fifth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{first_species, score_from_measures};

    #[test]
    fn test_first_species_build() {
        let score = first_species(&["C4", "D4", "E4", "D4", "C4"]);
        let part = &score.parts[0];
        assert_eq!(part.species, Species::First);
        assert_eq!(part.events.len(), 5);
        assert_eq!(part.events[2].measure, 3);
        assert_eq!(part.events[2].offset, Time::from_integer(8));
        assert!(part.events.iter().all(|e| e.on_downbeat()));
        assert_eq!(part.name, "Part 1");
    }

    #[test]
    fn test_second_species_build() {
        let score = score_from_measures(vec![vec![
            vec!["C4", "E4"],
            vec!["D4", "F4"],
            vec!["C4"],
        ]]);
        let part = &score.parts[0];
        assert_eq!(part.species, Species::Second);
        assert_eq!(part.events[1].beat, Time::from_integer(2));
        assert!(!part.events[1].on_downbeat());
    }

    #[test]
    fn test_fourth_species_detection() {
        let src = r#"{
            "parts": [{"measures": [
                [{"pitch": "C4", "duration": 4}],
                [{"pitch": "D4", "duration": 2}, {"pitch": "E4", "duration": 2, "tied": true}],
                [{"pitch": "E4", "duration": 2}, {"pitch": "D4", "duration": 2, "tied": true}],
                [{"pitch": "D4", "duration": 4}]
            ]}]
        }"#;
        let score = Score::from_json(src).unwrap();
        assert_eq!(score.parts[0].species, Species::Fourth);
        assert!(score.parts[0].events[2].tied_to_next);
        assert!(score.parts[0].events[3].tied_from_prev);
    }

    #[test]
    fn test_input_errors() {
        let e = Score::from_json(r#"{"parts": []}"#).unwrap_err();
        assert!(e.to_string().contains("does not contain any parts"));

        let src = r#"{"parts": [{"measures": [
            [{"pitch": "C4", "duration": 4}, {"pitch": "D4", "duration": 4}],
            [{"pitch": "C4", "duration": 4}]
        ]}]}"#;
        let e = Score::from_json(src).unwrap_err();
        assert!(e.to_string().contains("too many notes"));

        let src = r#"{"parts": [{"measures": [
            [{"pitch": "C4", "duration": 2}],
            [{"pitch": "C4", "duration": 4}]
        ]}]}"#;
        let e = Score::from_json(src).unwrap_err();
        assert!(e.to_string().contains("does not contain enough notes"));

        let src = r#"{"parts": [{"measures": [
            ["C4"], ["D4"], ["C4", "E4"]
        ]}]}"#;
        let e = Score::from_json(src).unwrap_err();
        assert!(e.to_string().contains("final measure contains too many notes"));
    }

    #[test]
    fn test_duration_formats() {
        let src = r#"{"bar": 4, "parts": [{"measures": [
            [{"pitch": "C4", "duration": "4/2"}, {"pitch": "D4", "duration": 2}],
            [{"pitch": "C4", "duration": 4}]
        ]}]}"#;
        let score = Score::from_json(src).unwrap();
        assert_eq!(score.parts[0].events[0].duration, Time::from_integer(2));
    }
}
