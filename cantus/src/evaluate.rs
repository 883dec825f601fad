use anyhow::Context;
use cantus_common::key::Mode;
use cantus_common::parse::LineType;
use cantus_common::pitch::parse_pitch_class;
use cantus_common::report::{
    EvaluationOptions, annotations, evaluate_counterpoint, evaluate_lines,
};
use cantus_common::score::Score;
use clap::{Args, ValueEnum};
use std::fs;
use std::path::PathBuf;

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Major,
    Minor,
}

impl From<ModeArg> for Mode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Major => Mode::Major,
            ModeArg::Minor => Mode::Minor,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum LineTypeArg {
    Primary,
    Bass,
    Generic,
    Any,
}

impl LineTypeArg {
    fn into_line_type(self) -> Option<LineType> {
        match self {
            LineTypeArg::Primary => Some(LineType::Primary),
            LineTypeArg::Bass => Some(LineType::Bass),
            LineTypeArg::Generic => Some(LineType::Generic),
            LineTypeArg::Any => None,
        }
    }
}

#[derive(Args)]
pub struct EvaluateOptions {
    /// Path to the score, a JSON file of parts ordered top to bottom
    source: PathBuf,
    /// Tonic of the key, e.g. C, F#, B-; inferred from the score if
    /// omitted
    #[arg(long, requires = "mode")]
    keynote: Option<String>,
    /// Mode of the key
    #[arg(long, value_enum, requires = "keynote")]
    mode: Option<ModeArg>,
    /// Part to evaluate, 0-based from the top; negative counts from the
    /// bottom
    #[arg(long, allow_negative_numbers = true)]
    part: Option<i64>,
    /// Line type to request for the evaluated part
    #[arg(long, value_enum, default_value = "any")]
    line_type: LineTypeArg,
    /// Emit annotated parses as JSON after the report
    #[arg(long)]
    annotate: bool,
}

fn load(options: &EvaluateOptions) -> anyhow::Result<(Score, EvaluationOptions)> {
    let src = fs::read_to_string(&options.source)
        .with_context(|| format!("unable to read {}", options.source.display()))?;
    let score = Score::from_json(&src)?;
    let keynote = options
        .keynote
        .as_deref()
        .map(parse_pitch_class)
        .transpose()?;
    Ok((
        score,
        EvaluationOptions {
            keynote,
            mode: options.mode.map(Mode::from),
            part_selection: options.part,
            line_type: options.line_type.into_line_type(),
            preferences: None,
        },
    ))
}

pub fn run_lines(options: EvaluateOptions) -> anyhow::Result<()> {
    let (score, eval_options) = load(&options)?;
    let evaluation = evaluate_lines(score, &eval_options)?;
    println!("{}", evaluation.report);
    if options.annotate {
        let ann = annotations(&evaluation);
        println!("{}", serde_json::to_string_pretty(&ann)?);
    }
    Ok(())
}

pub fn run_counterpoint(options: EvaluateOptions) -> anyhow::Result<()> {
    let (score, eval_options) = load(&options)?;
    let evaluation = evaluate_counterpoint(score, &eval_options)?;
    println!("{}", evaluation.report);
    Ok(())
}
