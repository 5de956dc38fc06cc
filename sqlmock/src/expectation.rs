//! A single declared unit of expected interaction.

use std::fmt::{self, Display};
use std::sync::Arc;

use itertools::Itertools;

use crate::pattern::{self, Pattern};
use crate::value::first_mismatch;
use crate::{Arg, Call, ExecResult, MismatchReason, Rows, UsageError};

/// The kind of a driver call, and of the expectation that must match it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpectationKind {
    Begin,
    Query,
    Exec,
    Commit,
    Rollback,
}

impl ExpectationKind {
    /// Whether expectations of this kind carry a pattern and arguments.
    pub fn is_statement(self) -> bool {
        matches!(self, ExpectationKind::Query | ExpectationKind::Exec)
    }
}

impl Display for ExpectationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExpectationKind::Begin => "begin",
            ExpectationKind::Query => "query",
            ExpectationKind::Exec => "exec",
            ExpectationKind::Commit => "commit",
            ExpectationKind::Rollback => "rollback",
        };
        write!(f, "{name}")
    }
}

/// What a matched expectation hands back to the caller.
#[derive(Debug, Clone)]
pub(crate) enum Outcome {
    Rows(Rows),
    Result(ExecResult),
    Error(Arc<dyn std::error::Error + Send + Sync>),
}

impl Outcome {
    fn name(&self) -> &'static str {
        match self {
            Outcome::Rows(_) => "rows",
            Outcome::Result(_) => "a result",
            Outcome::Error(_) => "an error",
        }
    }

    fn allowed_for(&self, kind: ExpectationKind) -> bool {
        match self {
            Outcome::Rows(_) => kind == ExpectationKind::Query,
            Outcome::Result(_) => kind == ExpectationKind::Exec,
            Outcome::Error(_) => true,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Expectation {
    kind: ExpectationKind,
    pattern: Option<Pattern>,
    args: Option<Vec<Arg>>,
    outcome: Option<Outcome>,
    fulfilled: bool,
}

impl Expectation {
    /// Only queries and statements carry a pattern; it is dropped for other kinds.
    pub fn new(kind: ExpectationKind, pattern: Option<Pattern>) -> Self {
        Self {
            kind,
            pattern: pattern.filter(|_| kind.is_statement()),
            args: None,
            outcome: None,
            fulfilled: false,
        }
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    pub fn is_fulfilled(&self) -> bool {
        self.fulfilled
    }

    pub fn fulfill(&mut self) {
        debug_assert!(!self.fulfilled, "expectation consumed twice");
        self.fulfilled = true;
    }

    pub fn set_args(&mut self, args: Vec<Arg>) -> Result<(), UsageError> {
        self.check_unsealed()?;
        if !self.kind.is_statement() {
            return Err(UsageError::ArgsNotAllowed { kind: self.kind });
        }
        if self.args.is_some() {
            return Err(UsageError::ArgsAlreadySet { kind: self.kind });
        }
        self.args = Some(args);
        Ok(())
    }

    pub fn set_outcome(&mut self, outcome: Outcome) -> Result<(), UsageError> {
        self.check_unsealed()?;
        if let Some(existing) = &self.outcome {
            return Err(UsageError::OutcomeAlreadySet {
                kind: self.kind,
                existing: existing.name(),
                outcome: outcome.name(),
            });
        }
        if !outcome.allowed_for(self.kind) {
            return Err(UsageError::OutcomeNotAllowed {
                kind: self.kind,
                outcome: outcome.name(),
            });
        }
        self.outcome = Some(outcome);
        Ok(())
    }

    fn check_unsealed(&self) -> Result<(), UsageError> {
        if self.fulfilled {
            return Err(UsageError::AlreadyFulfilled { kind: self.kind });
        }
        Ok(())
    }

    /// Checks `call` against this expectation: kind first, then pattern, then arguments.
    pub fn check(&self, call: &Call) -> Result<(), MismatchReason> {
        if call.kind != self.kind {
            return Err(MismatchReason::Kind);
        }
        if let Some(sql) = &call.sql {
            if !pattern::matches(self.pattern.as_ref(), sql) {
                return Err(MismatchReason::Pattern);
            }
        }
        if let Some(expected) = &self.args {
            if let Some(position) = first_mismatch(expected, &call.args) {
                return Err(MismatchReason::Args { position });
            }
        }
        Ok(())
    }

    pub fn summary(&self) -> ExpectationSummary {
        ExpectationSummary {
            kind: self.kind,
            pattern: self.pattern.clone(),
            args: self.args.clone(),
        }
    }
}

/// The matching constraints of an expectation, as shown in error messages.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpectationSummary {
    kind: ExpectationKind,
    pattern: Option<Pattern>,
    args: Option<Vec<Arg>>,
}

impl ExpectationSummary {
    pub fn kind(&self) -> ExpectationKind {
        self.kind
    }

    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_ref().map(Pattern::as_str)
    }

    pub fn args(&self) -> Option<&[Arg]> {
        self.args.as_deref()
    }
}

impl Display for ExpectationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        match &self.pattern {
            Some(p) => write!(f, " matching {p}")?,
            None if self.kind.is_statement() => write!(f, " (any text)")?,
            None => {}
        }
        if let Some(args) = &self.args {
            write!(f, " with args [{}]", args.iter().format(", "))?;
        }
        Ok(())
    }
}
