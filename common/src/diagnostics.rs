//! Collector for non-fatal findings: per-part line-parsing errors and
//! voice-leading violations. Fatal conditions (bad input, unusable key)
//! travel as `anyhow` errors instead; findings accumulate here and are
//! rendered into the reports.

use serde::Serialize;
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::mem;

pub mod code {
    pub const INPUT: &str = "E2001 input";
    pub const KEY: &str = "E2002 key";
    pub const LINE: &str = "E2003 line syntax";
    pub const STRUCTURE: &str = "E2004 basic structure";
    pub const VOICE_LEADING: &str = "E2005 voice leading";
    pub const CONTEXT: &str = "E2006 harmonic context";
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Finding {
    pub code: &'static str,
    /// 1-based measure number, when the finding points at one.
    pub measure: Option<usize>,
    pub message: String,
}

#[derive(Serialize, Default, Debug)]
pub struct Diagnostics {
    pub list: RefCell<Vec<Finding>>,
    #[serde(skip)]
    seen: RefCell<HashSet<Finding>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a finding, ignoring exact duplicates.
    pub fn push(&self, finding: Finding) {
        if self.seen.borrow_mut().insert(finding.clone()) {
            self.list.borrow_mut().push(finding);
        }
    }

    pub fn err(&self, code: &'static str, measure: Option<usize>, msg: impl Into<String>) {
        self.push(Finding {
            code,
            measure,
            message: msg.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.list.borrow().is_empty()
    }

    pub fn num_errors(&self) -> usize {
        self.list.borrow().len()
    }

    pub fn get_all(&self) -> Vec<Finding> {
        mem::take(&mut self.list.borrow_mut())
    }

    pub fn messages(&self) -> Vec<String> {
        self.list.borrow().iter().map(|f| f.message.clone()).collect()
    }
}

impl Display for Diagnostics {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let list = self.list.borrow();
        if list.is_empty() {
            return writeln!(f, "no errors");
        }
        let mut first = true;
        for i in &*list {
            if first {
                write!(f, "ERRORS: ")?;
                first = false;
            } else {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", i.code, i.message)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_and_display() {
        let d = Diagnostics::new();
        assert!(d.to_string().contains("no errors"));
        d.err(code::LINE, Some(2), "something");
        d.err(code::LINE, Some(2), "something");
        d.err(code::VOICE_LEADING, None, "else");
        assert_eq!(d.num_errors(), 2);
        assert_eq!(
            d.to_string(),
            "ERRORS: E2003 line syntax: something, E2005 voice leading: else"
        );
        assert_eq!(d.get_all().len(), 2);
        assert!(!d.has_errors());
    }
}
