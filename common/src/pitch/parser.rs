use crate::pitch::{Letter, Pitch};
use winnow::ascii::dec_int;
use winnow::combinator::{alt, empty};
use winnow::error::{ContextError, StrContext, StrContextValue};
use winnow::token::{one_of, take_while};
use winnow::{ModalParser, Parser};

fn letter<'s>() -> impl ModalParser<&'s str, Letter, ContextError<StrContext>> {
    one_of(|c: char| Letter::from_char(c).is_some())
        .map(|c: char| Letter::from_char(c).unwrap())
        .context(StrContext::Label("pitch letter"))
        .context(StrContext::Expected(StrContextValue::Description(
            "a letter A-G",
        )))
}

/// Zero or more accidental marks, all alike: `#`/`##` sharpen, `-`/`--`
/// flatten.
fn alteration<'s>() -> impl ModalParser<&'s str, i32, ContextError<StrContext>> {
    alt((
        take_while(1.., '#').map(|s: &str| s.len() as i32),
        take_while(1.., '-').map(|s: &str| -(s.len() as i32)),
        empty.value(0),
    ))
    .context(StrContext::Label("accidental"))
}

pub(super) fn pitch<'s>() -> impl ModalParser<&'s str, Pitch, ContextError<StrContext>> {
    (letter(), alteration(), octave())
        .map(|(letter, alter, octave)| Pitch::new(letter, alter, octave))
        .context(StrContext::Label("pitch"))
}

fn octave<'s>() -> impl ModalParser<&'s str, i32, ContextError<StrContext>> {
    // dec_int accepts a sign, so "C-1" must be written with the flat
    // reading excluded first; the alteration parser has already consumed
    // any '-' marks, leaving only an unsigned octave here.
    dec_int
        .verify(|x: &i32| (0..=9).contains(x))
        .context(StrContext::Label("octave"))
        .context(StrContext::Expected(StrContextValue::Description(
            "an octave number 0-9",
        )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch_parser() {
        let mut input = "F#4";
        let p = pitch().parse_next(&mut input).unwrap();
        assert_eq!(p, Pitch::new(Letter::F, 1, 4));
        assert!(input.is_empty());

        let mut input = "B--2x";
        let p = pitch().parse_next(&mut input).unwrap();
        assert_eq!(p, Pitch::new(Letter::B, -2, 2));
        assert_eq!(input, "x");

        let mut input = "X4";
        assert!(pitch().parse_next(&mut input).is_err());

        let mut input = "C#";
        assert!(pitch().parse_next(&mut input).is_err());
    }
}
