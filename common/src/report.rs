//! The top-level evaluation entry points and the textual reports they
//! produce. `evaluate_lines` answers whether each line is generable and
//! under what interpretations; `evaluate_counterpoint` reports
//! voice-leading findings. Rule violations are results, not failures:
//! only input and key problems surface as errors.

use crate::context::GlobalContext;
use crate::key::Mode;
use crate::parse::{
    ArcKind, Interpretation, LineType, PartAnalysis, Preferences, parse_part,
};
use crate::pitch::PitchClass;
use crate::score::Score;
use crate::selection::{ParseSet, select};
use crate::vl::{Violation, check_counterpoint};
use anyhow::bail;
use serde::Serialize;

#[derive(Debug, Clone, Default)]
pub struct EvaluationOptions {
    pub keynote: Option<PitchClass>,
    pub mode: Option<Mode>,
    /// 0-based from the top; negative indexes from the bottom.
    pub part_selection: Option<i64>,
    /// Restrict the requested line type; `None` means any.
    pub line_type: Option<LineType>,
    pub preferences: Option<Preferences>,
}

/// The outcome of a line evaluation: the report text plus everything a
/// caller needs to render annotations.
#[derive(Debug)]
pub struct LineEvaluation {
    pub report: String,
    pub ctx: GlobalContext,
    pub analyses: Vec<PartAnalysis>,
    pub preferred: Vec<ParseSet>,
}

#[derive(Debug)]
pub struct CounterpointEvaluation {
    pub report: String,
    pub ctx: GlobalContext,
    pub violations: Vec<Violation>,
}

fn resolve_part_selection(count: usize, selection: Option<i64>) -> anyhow::Result<Option<usize>> {
    let Some(s) = selection else {
        return Ok(None);
    };
    let idx = if s < 0 { count as i64 + s } else { s };
    if idx < 0 || idx >= count as i64 {
        bail!("Part selection {s} is out of range for a score with {count} part(s).");
    }
    Ok(Some(idx as usize))
}

fn key_line(ctx: &GlobalContext) -> String {
    if ctx.key_from_user {
        format!("Key supplied by user: {}", ctx.key)
    } else {
        format!("Key inferred by program: {}", ctx.key)
    }
}

fn indent_errors(analysis: &PartAnalysis, indent: &str) -> String {
    analysis
        .errors
        .messages()
        .iter()
        .map(|m| format!("\n{indent}{m}"))
        .collect()
}

/// Evaluate the lines of a score against the rules of line
/// construction.
pub fn evaluate_lines(score: Score, options: &EvaluationOptions) -> anyhow::Result<LineEvaluation> {
    let selection = resolve_part_selection(score.parts.len(), options.part_selection)?;
    let ctx = GlobalContext::new(score, options.keynote, options.mode)?;
    let prefs = options.preferences.clone().unwrap_or_default();

    let analyses: Vec<PartAnalysis> = (0..ctx.parts.len())
        .map(|i| {
            let requested = match selection {
                Some(s) if s == i => options.line_type,
                Some(_) => None,
                None => options.line_type,
            };
            if selection.is_none() || selection == Some(i) {
                parse_part(&ctx, i, requested, &prefs)
            } else {
                PartAnalysis {
                    part_index: i,
                    ..Default::default()
                }
            }
        })
        .collect();

    let mut report = format!("{}\nPARSE REPORT\n{}", ctx.title, key_line(&ctx));

    if let Some(sel) = selection.or(if ctx.parts.len() == 1 { Some(0) } else { None }) {
        report_single_part(&mut report, &analyses[sel], options.line_type);
    } else {
        report_multi_part(&mut report, &ctx, &analyses);
    }

    let preferred = select(&ctx, &analyses);
    Ok(LineEvaluation {
        report,
        ctx,
        analyses,
        preferred,
    })
}

fn report_single_part(report: &mut String, analysis: &PartAnalysis, requested: Option<LineType>) {
    let result = match requested {
        Some(lt) => {
            let ok = !analysis.interpretations(lt).is_empty();
            if ok {
                format!("The line is generable as a {lt} line.")
            } else {
                format!(
                    "The line is not generable as the selected type: {lt}\n\
                     The following linear errors were found:{}",
                    indent_errors(analysis, "\t\t")
                )
            }
        }
        None => {
            if analysis.is_primary() && analysis.is_bass() {
                "The line is generable as both a primary line and a bass line.".to_string()
            } else if analysis.is_bass() {
                "The line is generable as a bass line but not as a primary line.".to_string()
            } else if analysis.is_primary() {
                "The line is generable as a primary line but not as a bass line.".to_string()
            } else if analysis.is_generic() {
                "The line is generable only as a generic line.".to_string()
            } else {
                format!(
                    "Line Parsing Errors\n\tThe following linear errors were \
                     found when attempting to interpret the line:{}",
                    indent_errors(analysis, "\t\t")
                )
            }
        }
    };
    report.push('\n');
    report.push_str(&result);
}

fn report_multi_part(report: &mut String, ctx: &GlobalContext, analyses: &[PartAnalysis]) {
    let two = ctx.parts.len() == 2;
    let upper_primary = analyses[..analyses.len() - 1].iter().any(|a| a.is_primary());
    let lower_bass = analyses.last().map(|a| a.is_bass()).unwrap_or(false);
    let result = match (upper_primary, lower_bass) {
        (true, true) => {
            if two {
                "The upper line is generable as a primary line.\n\
                 The lower line is generable as a bass line."
                    .to_string()
            } else {
                "At least one upper line is generable as a primary line.\n\
                 The lower line is generable as a bass line."
                    .to_string()
            }
        }
        (false, true) => {
            let mut s = if two {
                "The upper line is not generable as a primary line.\n\
                 But the lower line is generable as a bass line."
                    .to_string()
            } else {
                "No upper line is generable as a primary line.\n\
                 But the lower line is generable as a bass line."
                    .to_string()
            };
            for a in &analyses[..analyses.len() - 1] {
                if a.errors.has_errors() {
                    s += &format!(
                        "\n\tThe following linear errors were found in {}:{}",
                        ctx.parts[a.part_index].name(),
                        indent_errors(a, "\t\t\t")
                    );
                }
            }
            s
        }
        (true, false) => {
            let mut s = if two {
                "The upper line is generable as a primary line.\n\
                 But the lower line is not generable as a bass line."
                    .to_string()
            } else {
                "At least one upper line is generable as a primary line.\n\
                 But the lower line is not generable as a bass line."
                    .to_string()
            };
            let bass = analyses.last().unwrap();
            if bass.errors.has_errors() {
                s += &format!(
                    "\n\tThe following linear errors were found in the bass \
                     line:{}",
                    indent_errors(bass, "\t\t\t")
                );
            }
            s
        }
        (false, false) => {
            let mut s = if two {
                "The upper line is not generable as a primary line.\n\
                 Nor is the lower line generable as a bass line."
                    .to_string()
            } else {
                "No upper line is generable as a primary line.\n\
                 Nor is the lower line generable as a bass line."
                    .to_string()
            };
            for a in analyses {
                if a.errors.has_errors() {
                    s += &format!(
                        "\n\tThe following linear errors were found in {}:{}",
                        ctx.parts[a.part_index].name(),
                        indent_errors(a, "\t\t")
                    );
                }
            }
            s
        }
    };
    report.push('\n');
    report.push_str(&result);
}

/// Evaluate the voice leading of a score.
pub fn evaluate_counterpoint(
    score: Score,
    options: &EvaluationOptions,
) -> anyhow::Result<CounterpointEvaluation> {
    if score.parts.len() < 2 {
        bail!("Context Error: The voice-leading checker requires at least two parts.");
    }
    let ctx = GlobalContext::new(score, options.keynote, options.mode)?;
    let violations = check_counterpoint(&ctx);
    let mut report = format!("{}\nVOICE LEADING REPORT", ctx.title);
    if violations.is_empty() {
        report.push_str("\nNo voice-leading errors found.");
    } else {
        report.push_str("\nThe following voice-leading errors were found:");
        for v in &violations {
            report.push_str(&format!("\n\t\t{}", v.message));
        }
    }
    Ok(CounterpointEvaluation {
        report,
        ctx,
        violations,
    })
}

/// Annotations for external rendering: every event labeled with its
/// generating rule, and arcs as slur-like groupings (dashed for
/// register transfers).
#[derive(Serialize, Debug)]
pub struct Annotations {
    pub key: String,
    pub parts: Vec<PartAnnotation>,
}

#[derive(Serialize, Debug)]
pub struct PartAnnotation {
    pub name: String,
    pub interpretations: Vec<InterpAnnotation>,
}

#[derive(Serialize, Debug)]
pub struct InterpAnnotation {
    pub line_type: LineType,
    pub events: Vec<EventAnnotation>,
    pub arcs: Vec<ArcAnnotation>,
}

#[derive(Serialize, Debug)]
pub struct EventAnnotation {
    pub index: usize,
    pub pitch: String,
    pub measure: usize,
    pub rule: &'static str,
    /// Structural tones render distinctly from elaborations.
    pub structural: bool,
    pub parenthesis: bool,
}

#[derive(Serialize, Debug)]
pub struct ArcAnnotation {
    pub kind: ArcKind,
    pub indices: Vec<usize>,
    pub dashed: bool,
}

fn annotate_interpretation(
    ctx: &GlobalContext,
    part: usize,
    interp: &Interpretation,
) -> InterpAnnotation {
    let events = ctx.parts[part]
        .events()
        .iter()
        .map(|e| EventAnnotation {
            index: e.index,
            pitch: e.pitch.to_string(),
            measure: e.measure,
            rule: interp.labels[e.index].code(),
            structural: interp.labels[e.index].is_structural(),
            parenthesis: interp.parens[e.index],
        })
        .collect();
    let arcs = interp
        .arcs
        .iter()
        .map(|a| ArcAnnotation {
            kind: a.kind,
            indices: a.indices.clone(),
            dashed: a.dashed,
        })
        .collect();
    InterpAnnotation {
        line_type: interp.line_type,
        events,
        arcs,
    }
}

pub fn annotations(evaluation: &LineEvaluation) -> Annotations {
    Annotations {
        key: evaluation.ctx.key.to_string(),
        parts: evaluation
            .analyses
            .iter()
            .map(|a| PartAnnotation {
                name: evaluation.ctx.parts[a.part_index].name().to_string(),
                interpretations: a
                    .all()
                    .map(|i| annotate_interpretation(&evaluation.ctx, a.part_index, i))
                    .collect(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{first_species, two_parts};

    #[test]
    fn test_primary_line_report() {
        let score = first_species(&["G4", "A4", "G4", "F4", "E4", "D4", "C4"]);
        let options = EvaluationOptions {
            line_type: Some(LineType::Primary),
            ..Default::default()
        };
        let e = evaluate_lines(score, &options).unwrap();
        assert!(e.report.contains("PARSE REPORT"));
        assert!(e.report.contains("Key inferred by program: C major"));
        assert!(e.report.contains("The line is generable as a primary line."));
    }

    #[test]
    fn test_not_generable_report() {
        let score = first_species(&["C4", "D4", "E4", "D4", "C4"]);
        let options = EvaluationOptions {
            line_type: Some(LineType::Bass),
            ..Default::default()
        };
        let e = evaluate_lines(score, &options).unwrap();
        assert!(
            e.report
                .contains("The line is not generable as the selected type: bass")
        );
        assert!(e.report.contains("No candidate for S3 detected."));
    }

    #[test]
    fn test_two_part_report() {
        let score = two_parts(&["E4", "D4", "C4"], &["C3", "G3", "C3"]);
        let e = evaluate_lines(score, &EvaluationOptions::default()).unwrap();
        assert!(e.report.contains("The upper line is generable as a primary line."));
        assert!(e.report.contains("The lower line is generable as a bass line."));
        assert!(!e.preferred.is_empty());
    }

    #[test]
    fn test_part_selection() {
        let score = two_parts(&["E4", "D4", "C4"], &["C3", "G3", "C3"]);
        let options = EvaluationOptions {
            part_selection: Some(-1),
            line_type: Some(LineType::Bass),
            ..Default::default()
        };
        let e = evaluate_lines(score, &options).unwrap();
        assert!(e.report.contains("The line is generable as a bass line."));

        let score = two_parts(&["E4", "D4", "C4"], &["C3", "G3", "C3"]);
        let options = EvaluationOptions {
            part_selection: Some(5),
            ..Default::default()
        };
        assert!(evaluate_lines(score, &options).is_err());
    }

    #[test]
    fn test_counterpoint_report() {
        let score = two_parts(&["C4", "D4", "E4", "D4", "C4"], &["C3", "G3", "C3"]);
        let e = evaluate_counterpoint(score, &EvaluationOptions::default()).unwrap();
        assert!(e.report.contains("VOICE LEADING REPORT"));
        assert!(e.report.contains("No voice-leading errors found."));

        let score = two_parts(&["C4", "D4", "C4"], &["C3", "D3", "C3"]);
        let options = EvaluationOptions {
            keynote: Some(crate::pitch::parse_pitch_class("C").unwrap()),
            mode: Some(Mode::Major),
            ..Default::default()
        };
        let e = evaluate_counterpoint(score, &options).unwrap();
        assert!(e.report.contains("The following voice-leading errors were found:"));
        assert!(e.report.contains("Forbidden parallel motion to octave"));
    }

    #[test]
    fn test_annotations_export() {
        let score = first_species(&["G4", "A4", "G4", "F4", "E4", "D4", "C4"]);
        let e = evaluate_lines(score, &EvaluationOptions::default()).unwrap();
        let ann = annotations(&e);
        assert_eq!(ann.key, "C major");
        let interp = &ann.parts[0].interpretations[0];
        assert_eq!(interp.events.len(), 7);
        assert!(interp.events.iter().any(|ev| ev.structural));
        let json = serde_json::to_string(&ann).unwrap();
        assert!(json.contains("\"rule\":\"S1\""));
    }
}
