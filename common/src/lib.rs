//! Core analysis library for cantus: evaluates species-counterpoint
//! exercises against Westergaard's rules of line construction and
//! voice leading.

use anyhow::anyhow;
use std::fmt::Display;

pub mod consecutions;
pub mod context;
pub mod csd;
pub mod diagnostics;
pub mod key;
pub mod parse;
pub mod pitch;
pub mod report;
pub mod score;
pub mod selection;
pub mod test_helpers;
pub mod vl;

pub fn to_anyhow<E: Display>(e: E) -> anyhow::Error {
    anyhow!("{e}")
}
