//! Cross-part parse selection. When several parts each admit several
//! interpretations, preference rules filter the combinations: the
//! structural dominants of upper and lower lines should arrive as close
//! together as possible. Selection never invents an interpretation, it
//! only discards unpreferred ones.

use crate::context::GlobalContext;
use crate::parse::{Interpretation, LineType, PartAnalysis};
use crate::score::Time;

/// A compatible assignment of one interpretation per part, identified
/// by (part, line type, index within that type's list).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSet {
    pub picks: Vec<(usize, LineType, usize)>,
}

fn s3_offset(ctx: &GlobalContext, part: usize, interp: &Interpretation) -> Option<Time> {
    interp.s3.map(|i| ctx.parts[part].events()[i].offset)
}

fn distance(a: Time, b: Time) -> Time {
    if a > b { a - b } else { b - a }
}

/// Select the preferred cross-part combinations.
///
/// * One part: every interpretation passes through.
/// * Two parts: for each (primary, bass) pair, measure the offset
///   distance between the upper line's structural dominant and the
///   bass's; keep the pairs at the minimum. Ties are kept.
/// * Three or more parts: at least one upper line must be primary;
///   otherwise selection works as in the two-part case against the
///   bass.
pub fn select(ctx: &GlobalContext, analyses: &[PartAnalysis]) -> Vec<ParseSet> {
    if analyses.len() == 1 {
        return analyses[0]
            .attempted
            .iter()
            .flat_map(|&lt| {
                (0..analyses[0].interpretations(lt).len())
                    .map(move |i| ParseSet {
                        picks: vec![(0, lt, i)],
                    })
            })
            .collect();
    }

    let lower = analyses.len() - 1;
    let bass = &analyses[lower];
    let mut pairs: Vec<(ParseSet, Time)> = Vec::new();
    for (upper_idx, upper) in analyses.iter().enumerate().take(lower) {
        for (pi, p) in upper.primary.iter().enumerate() {
            for (bi, b) in bass.bass.iter().enumerate() {
                let (Some(po), Some(bo)) = (
                    s3_offset(ctx, upper_idx, p),
                    s3_offset(ctx, lower, b),
                ) else {
                    continue;
                };
                pairs.push((
                    ParseSet {
                        picks: vec![
                            (upper_idx, LineType::Primary, pi),
                            (lower, LineType::Bass, bi),
                        ],
                    },
                    distance(po, bo),
                ));
            }
        }
    }
    let Some(min) = pairs.iter().map(|(_, d)| *d).min() else {
        return Vec::new();
    };
    pairs
        .into_iter()
        .filter(|(_, d)| *d == min)
        .map(|(s, _)| s)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GlobalContext;
    use crate::parse::{Preferences, parse_part};
    use crate::test_helpers::{first_species, two_parts};

    fn analyses(ctx: &GlobalContext) -> Vec<PartAnalysis> {
        (0..ctx.parts.len())
            .map(|i| parse_part(ctx, i, None, &Preferences::default()))
            .collect()
    }

    #[test]
    fn test_single_part_passthrough() {
        let ctx = GlobalContext::new(
            first_species(&["G4", "A4", "G4", "F4", "E4", "D4", "C4"]),
            None,
            None,
        )
        .unwrap();
        let a = analyses(&ctx);
        let sets = select(&ctx, &a);
        let total: usize = a[0]
            .attempted
            .iter()
            .map(|&lt| a[0].interpretations(lt).len())
            .sum();
        assert_eq!(sets.len(), total);
    }

    #[test]
    fn test_two_part_minimal_distance() {
        // The upper octave line admits dominants on its B, G, or D; the
        // bass settles on the G in bar 6. The selected pairs are the
        // ones whose dominants arrive closest together: upper S3 on the
        // D of bar 7.
        let score = two_parts(
            &["C5", "B4", "A4", "G4", "F4", "E4", "D4", "C4"],
            &["C3", "E3", "G3", "C3", "E3", "G3", "G3", "C3"],
        );
        let ctx = GlobalContext::new(score, None, None).unwrap();
        let a = analyses(&ctx);
        assert!(a[0].is_primary());
        assert!(a[1].is_bass());
        assert_eq!(a[1].bass.len(), 1);
        assert_eq!(a[1].bass[0].s3, Some(5));
        let sets = select(&ctx, &a);
        assert!(!sets.is_empty());
        for set in &sets {
            assert_eq!(set.picks.len(), 2);
            let (p_part, _, pi) = set.picks[0];
            let (b_part, _, bi) = set.picks[1];
            let p = &a[p_part].primary[pi];
            let b = &a[b_part].bass[bi];
            assert_eq!(p.s3, Some(6));
            assert_eq!(b.s3, Some(5));
        }
    }
}
