//! The mock session standing in for a real database connection.

use std::fmt::{self, Display};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::expectation::Outcome;
use crate::queue::ExpectationQueue;
use crate::{
    registry, Call, Conn, Error, ExecResult, ExpectationKind, MismatchReason, QueryMatcher, Rows,
    Value,
};

/// Transaction state of a mock session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    InTransaction,
    Closed,
}

impl Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "not in a transaction"),
            SessionState::InTransaction => write!(f, "already in a transaction"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

#[derive(Debug)]
pub(crate) struct Inner {
    pub queue: ExpectationQueue,
    pub state: SessionState,
}

/// State shared by every handle onto one session.
///
/// All reads and writes of the queue happen under `inner`'s lock, so inspecting the
/// head, deciding and consuming it is one critical section.
#[derive(Debug)]
pub(crate) struct Shared {
    pub dsn: String,
    pub matcher: QueryMatcher,
    pub inner: Mutex<Inner>,
}

impl Shared {
    pub fn new(dsn: String, matcher: QueryMatcher) -> Self {
        Self {
            dsn,
            matcher,
            inner: Mutex::new(Inner {
                queue: ExpectationQueue::default(),
                state: SessionState::Idle,
            }),
        }
    }

    /// Matches `call` against the head of the queue and applies the state transition.
    fn consume(&self, call: Call) -> Result<Option<Outcome>, Error> {
        let mut inner = self.inner.lock();
        let state = inner.state;
        let kind = call.kind;

        let allowed = match kind {
            _ if state == SessionState::Closed => return Err(Error::Closed),
            ExpectationKind::Begin => state == SessionState::Idle,
            ExpectationKind::Commit | ExpectationKind::Rollback => {
                state == SessionState::InTransaction
            }
            ExpectationKind::Query | ExpectationKind::Exec => true,
        };
        if !allowed {
            let err = inner.queue.mismatch(call, MismatchReason::State(state));
            tracing::warn!(dsn = %self.dsn, %err, "call rejected");
            return Err(err.into());
        }

        let outcome = match inner.queue.consume(call) {
            Ok(expectation) => {
                tracing::debug!(dsn = %self.dsn, expectation = %expectation.summary(), "expectation matched");
                expectation.outcome().cloned()
            }
            Err(err) => {
                tracing::warn!(dsn = %self.dsn, %err, "call rejected");
                return Err(err.into());
            }
        };

        let failed = matches!(outcome, Some(Outcome::Error(_)));
        match kind {
            ExpectationKind::Begin if !failed => inner.state = SessionState::InTransaction,
            ExpectationKind::Begin => {}
            ExpectationKind::Commit | ExpectationKind::Rollback => {
                inner.state = SessionState::Idle
            }
            ExpectationKind::Query | ExpectationKind::Exec => {}
        }
        Ok(outcome)
    }

    fn unit(&self, kind: ExpectationKind) -> Result<(), Error> {
        match self.consume(Call::new(kind))? {
            Some(Outcome::Error(e)) => Err(Error::Driver(e)),
            _ => Ok(()),
        }
    }

    pub fn query(&self, sql: &str, args: &[Value]) -> Result<Rows, Error> {
        let call = Call::with_sql(ExpectationKind::Query, sql, args);
        match self.consume(call)? {
            Some(Outcome::Rows(rows)) => Ok(rows.rewind()),
            Some(Outcome::Error(e)) => Err(Error::Driver(e)),
            Some(Outcome::Result(_)) | None => Ok(Rows::empty()),
        }
    }

    pub fn exec(&self, sql: &str, args: &[Value]) -> Result<ExecResult, Error> {
        let call = Call::with_sql(ExpectationKind::Exec, sql, args);
        match self.consume(call)? {
            Some(Outcome::Result(result)) => Ok(result),
            Some(Outcome::Error(e)) => Err(Error::Driver(e)),
            Some(Outcome::Rows(_)) | None => Ok(ExecResult::default()),
        }
    }

    /// Moves the session to `Closed` and verifies it. The session is closed even when
    /// verification fails.
    pub fn close(&self) -> Result<(), Error> {
        let mut inner = self.inner.lock();
        if inner.state == SessionState::Closed {
            return Ok(());
        }
        inner.state = SessionState::Closed;
        registry::forget_session(&self.dsn);

        match inner.queue.verify() {
            Ok(()) => {
                tracing::info!(dsn = %self.dsn, "mock session closed");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(dsn = %self.dsn, %err, "mock session closed with unmet expectations");
                Err(err.into())
            }
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }
}

/// The connection handed to the program under test.
///
/// Handles are cheap to clone and all clones drive the same session.
#[derive(Debug, Clone)]
pub struct MockConn {
    shared: Arc<Shared>,
}

impl MockConn {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Prepares `sql` for later execution.
    ///
    /// Preparing consumes no expectation: each execution of the statement is matched
    /// as an ordinary query or exec with the prepared text.
    pub fn prepare(&self, sql: &str) -> Result<MockStatement, Error> {
        if self.shared.state() == SessionState::Closed {
            return Err(Error::Closed);
        }
        Ok(MockStatement {
            shared: self.shared.clone(),
            sql: sql.to_string(),
        })
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    pub fn dsn(&self) -> &str {
        &self.shared.dsn
    }
}

impl Conn for MockConn {
    type Error = Error;

    fn begin(&mut self) -> Result<(), Error> {
        self.shared.unit(ExpectationKind::Begin)
    }

    fn query(&mut self, sql: &str, args: &[Value]) -> Result<Rows, Error> {
        self.shared.query(sql, args)
    }

    fn exec(&mut self, sql: &str, args: &[Value]) -> Result<ExecResult, Error> {
        self.shared.exec(sql, args)
    }

    fn commit(&mut self) -> Result<(), Error> {
        self.shared.unit(ExpectationKind::Commit)
    }

    fn rollback(&mut self) -> Result<(), Error> {
        self.shared.unit(ExpectationKind::Rollback)
    }

    fn close(&mut self) -> Result<(), Error> {
        self.shared.close()
    }

    fn engine_name(&self) -> &str {
        registry::MOCK_DRIVER
    }
}

/// A prepared statement on a mock session. It may be executed from any thread.
#[derive(Debug, Clone)]
pub struct MockStatement {
    shared: Arc<Shared>,
    sql: String,
}

impl MockStatement {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn query(&self, args: &[Value]) -> Result<Rows, Error> {
        self.shared.query(&self.sql, args)
    }

    pub fn exec(&self, args: &[Value]) -> Result<ExecResult, Error> {
        self.shared.exec(&self.sql, args)
    }
}
