use std::fmt::{self, Display};
use std::sync::Arc;

use itertools::Itertools;
use owo_colors::OwoColorize;

use crate::{ExpectationKind, ExpectationSummary, SessionState, Value};

/// The error type of every fallible operation in this crate.
#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error(transparent)]
    Usage(#[from] UsageError),
    #[error(transparent)]
    Mismatch(#[from] MismatchError),
    #[error(transparent)]
    Unmet(#[from] UnmetExpectationsError),
    /// An error produced by the driver itself. For the mock this is the error a test
    /// attached to the matched expectation, passed through untouched.
    #[error("{0}")]
    Driver(Arc<dyn std::error::Error + Send + Sync>),
    #[error("connection is closed")]
    Closed,
    #[error("unknown driver {0:?} (forgotten registration?)")]
    UnknownDriver(String),
    #[error("driver {0:?} is already registered")]
    DuplicateDriver(String),
    #[error("no mock session is open for connection string {0:?}")]
    UnknownDsn(String),
    #[error("a mock session is already open for connection string {0:?}")]
    DuplicateDsn(String),
}

impl Error {
    /// Returns the underlying driver error, if this is one.
    pub fn driver_error(&self) -> Option<&Arc<dyn std::error::Error + Send + Sync>> {
        match self {
            Error::Driver(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_mismatch(&self) -> bool {
        matches!(self, Error::Mismatch(_))
    }
}

/// A mistake in how expectations were declared. Reported at declaration time.
#[derive(thiserror::Error, Debug, Clone)]
#[non_exhaustive]
pub enum UsageError {
    #[error("invalid query pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },
    #[error("{kind} expectations do not take arguments")]
    ArgsNotAllowed { kind: ExpectationKind },
    #[error("arguments are already set on this {kind} expectation")]
    ArgsAlreadySet { kind: ExpectationKind },
    #[error("{kind} expectations cannot return {outcome}")]
    OutcomeNotAllowed {
        kind: ExpectationKind,
        outcome: &'static str,
    },
    #[error("this {kind} expectation already returns {existing}, cannot also return {outcome}")]
    OutcomeAlreadySet {
        kind: ExpectationKind,
        existing: &'static str,
        outcome: &'static str,
    },
    #[error("this {kind} expectation was already fulfilled and cannot be changed")]
    AlreadyFulfilled { kind: ExpectationKind },
    #[error("cannot declare expectations on a closed session")]
    SessionClosed,
    #[error("row has {actual} values but the result set has {expected} columns")]
    RowWidth { expected: usize, actual: usize },
}

/// An incoming call on a mock session.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub kind: ExpectationKind,
    /// Query text, for queries and statements.
    pub sql: Option<String>,
    pub args: Vec<Value>,
}

impl Call {
    pub(crate) fn new(kind: ExpectationKind) -> Self {
        Self {
            kind,
            sql: None,
            args: vec![],
        }
    }

    pub(crate) fn with_sql(kind: ExpectationKind, sql: &str, args: &[Value]) -> Self {
        Self {
            kind,
            sql: Some(sql.to_string()),
            args: args.to_vec(),
        }
    }
}

/// Which part of a call failed to correspond to the pending expectation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchReason {
    /// The pending expectation is of another kind.
    Kind,
    /// The query text does not match the pattern.
    Pattern,
    /// The argument at this position does not match, or the argument counts differ.
    Args { position: usize },
    /// The call is not valid in the session's transaction state.
    State(SessionState),
    /// Every expectation was already fulfilled.
    Exhausted,
}

impl Display for MismatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MismatchReason::Kind => write!(f, "kind mismatch"),
            MismatchReason::Pattern => write!(f, "query text does not match the pattern"),
            MismatchReason::Args { position } => {
                write!(f, "argument {position} does not match")
            }
            MismatchReason::State(state) => write!(f, "session is {state}"),
            MismatchReason::Exhausted => write!(f, "all expectations were already fulfilled"),
        }
    }
}

/// A call that does not correspond to the pending expectation.
///
/// For colored error message, use `self.display()`.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub struct MismatchError {
    pub(crate) call: Call,
    pub(crate) reason: MismatchReason,
    pub(crate) expected: Option<ExpectationSummary>,
}

impl MismatchError {
    pub fn call(&self) -> &Call {
        &self.call
    }

    pub fn reason(&self) -> MismatchReason {
        self.reason
    }

    /// The expectation at the head of the queue, `None` if the queue was exhausted.
    pub fn expected(&self) -> Option<&ExpectationSummary> {
        self.expected.as_ref()
    }

    pub fn display(&self, colorize: bool) -> MismatchErrorDisplay<'_> {
        MismatchErrorDisplay {
            err: self,
            colorize,
        }
    }
}

impl Display for MismatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.display(false).fmt(f)
    }
}

/// Overrides the `Display` implementation of [`MismatchError`] to support controlling
/// colorization.
pub struct MismatchErrorDisplay<'a> {
    err: &'a MismatchError,
    colorize: bool,
}

impl Display for MismatchErrorDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let MismatchError {
            call,
            reason,
            expected,
        } = self.err;
        writeln!(f, "unexpected {}: {reason}", call.kind)?;
        if let Some(sql) = &call.sql {
            let args = format!("[{}]", call.args.iter().format(", "));
            if self.colorize {
                writeln!(f, "[SQL] {}", sql.bright_red())?;
                writeln!(f, "[ARGS] {}", args.bright_red())?;
            } else {
                writeln!(f, "[SQL] {sql}")?;
                writeln!(f, "[ARGS] {args}")?;
            }
        }
        match expected {
            Some(expected) if self.colorize => write!(f, "[EXPECTED] {}", expected.bright_green()),
            Some(expected) => write!(f, "[EXPECTED] {expected}"),
            None => write!(f, "[EXPECTED] nothing"),
        }
    }
}

/// Expectations that were declared but never consumed.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub struct UnmetExpectationsError {
    pub(crate) unmet: Vec<ExpectationSummary>,
}

impl UnmetExpectationsError {
    /// The unmet expectations in declaration order.
    pub fn unmet(&self) -> &[ExpectationSummary] {
        &self.unmet
    }
}

impl Display for UnmetExpectationsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "there are {} unfulfilled expectations:",
            self.unmet.len()
        )?;
        for e in &self.unmet {
            write!(f, "\n  - {e}")?;
        }
        Ok(())
    }
}
