//! Declaring expectations on a mock session.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::expectation::{Expectation, Outcome};
use crate::session::{Shared, SessionState};
use crate::{
    registry, Arg, Error, ExecResult, ExpectationKind, MockConn, QueryMatcher, Rows,
    UnmetExpectationsError, UsageError,
};

/// Options of a mock session.
#[derive(Debug, Clone, Default)]
pub struct MockOptions {
    query_matcher: QueryMatcher,
    dsn: Option<String>,
}

impl MockOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// How query patterns are matched. Defaults to [`QueryMatcher::Regex`].
    pub fn query_matcher(mut self, matcher: QueryMatcher) -> Self {
        self.query_matcher = matcher;
        self
    }

    /// Connection string the session is registered under, so it can be opened through
    /// the [registry](crate::registry). A unique one is generated if unset.
    pub fn dsn(mut self, dsn: impl Into<String>) -> Self {
        self.dsn = Some(dsn.into());
        self
    }
}

/// Creates a mock session with default options.
///
/// Returns the connection for the program under test and the [`Sqlmock`] handle to
/// declare expectations on.
pub fn new() -> (MockConn, Sqlmock) {
    pair(generated_session(QueryMatcher::default()))
}

/// Creates a mock session with the given options.
///
/// Fails if a session is already open under the requested connection string.
pub fn with_options(options: MockOptions) -> Result<(MockConn, Sqlmock), Error> {
    let MockOptions { query_matcher, dsn } = options;
    let shared = match dsn {
        Some(dsn) => {
            let shared = Arc::new(Shared::new(dsn, query_matcher));
            registry::remember_session(&shared)?;
            shared
        }
        None => generated_session(query_matcher),
    };
    Ok(pair(shared))
}

fn generated_session(matcher: QueryMatcher) -> Arc<Shared> {
    static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

    loop {
        let dsn = format!("sqlmock_db_{}", NEXT_ID.fetch_add(1, Ordering::Relaxed));
        let shared = Arc::new(Shared::new(dsn, matcher));
        // only taken if the caller picked this name by hand
        if registry::remember_session(&shared).is_ok() {
            return shared;
        }
    }
}

fn pair(shared: Arc<Shared>) -> (MockConn, Sqlmock) {
    tracing::info!(dsn = %shared.dsn, matcher = ?shared.matcher, "mock session opened");
    (MockConn::new(shared.clone()), Sqlmock { shared })
}

/// Declares the expected interactions of a mock session.
///
/// Expectations are matched in the order they are declared.
#[derive(Debug, Clone)]
pub struct Sqlmock {
    shared: Arc<Shared>,
}

impl Sqlmock {
    /// The connection string this session is registered under.
    pub fn dsn(&self) -> &str {
        &self.shared.dsn
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Opens another connection onto this session.
    pub fn conn(&self) -> MockConn {
        MockConn::new(self.shared.clone())
    }

    /// Expects a transaction to begin.
    pub fn expect_begin(&self) -> Result<ExpectationBuilder, UsageError> {
        self.push(Expectation::new(ExpectationKind::Begin, None))
    }

    pub fn expect_commit(&self) -> Result<ExpectationBuilder, UsageError> {
        self.push(Expectation::new(ExpectationKind::Commit, None))
    }

    pub fn expect_rollback(&self) -> Result<ExpectationBuilder, UsageError> {
        self.push(Expectation::new(ExpectationKind::Rollback, None))
    }

    /// Expects a query whose text matches `pattern`.
    pub fn expect_query(&self, pattern: &str) -> Result<ExpectationBuilder, UsageError> {
        let pattern = self.shared.matcher.compile(pattern)?;
        self.push(Expectation::new(ExpectationKind::Query, Some(pattern)))
    }

    /// Expects a statement whose text matches `pattern`.
    pub fn expect_exec(&self, pattern: &str) -> Result<ExpectationBuilder, UsageError> {
        let pattern = self.shared.matcher.compile(pattern)?;
        self.push(Expectation::new(ExpectationKind::Exec, Some(pattern)))
    }

    /// Expects a call of `kind` with any query text.
    pub fn expect(&self, kind: ExpectationKind) -> Result<ExpectationBuilder, UsageError> {
        self.push(Expectation::new(kind, None))
    }

    /// Checks that every declared expectation was consumed, without closing the session.
    pub fn expectations_were_met(&self) -> Result<(), UnmetExpectationsError> {
        self.shared.inner.lock().queue.verify()
    }

    /// Appends `expectation` to the queue. Fails once the session is closed.
    fn push(&self, expectation: Expectation) -> Result<ExpectationBuilder, UsageError> {
        let idx = {
            let mut inner = self.shared.inner.lock();
            if inner.state == SessionState::Closed {
                return Err(UsageError::SessionClosed);
            }
            tracing::debug!(dsn = %self.shared.dsn, expectation = %expectation.summary(), "expectation declared");
            inner.queue.push(expectation)
        };
        Ok(ExpectationBuilder {
            shared: self.shared.clone(),
            idx,
        })
    }
}

/// Handle onto a declared expectation, refining it in place.
///
/// ```
/// # fn main() -> Result<(), sqlmock::UsageError> {
/// let (_conn, mock) = sqlmock::new();
/// mock.expect_query("SELECT (.+) FROM orders")?
///     .with_args([1])?
///     .will_return_rows(sqlmock::Rows::new(["status"]).add_row([1])?)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ExpectationBuilder {
    shared: Arc<Shared>,
    idx: usize,
}

impl ExpectationBuilder {
    /// Requires the call to bind exactly these arguments. Only for queries and statements.
    pub fn with_args<I>(self, args: I) -> Result<Self, UsageError>
    where
        I: IntoIterator,
        I::Item: Into<Arg>,
    {
        let args = args.into_iter().map(Into::into).collect();
        self.update(|e| e.set_args(args))
    }

    /// Returns `rows` when matched. Only for queries.
    pub fn will_return_rows(self, rows: Rows) -> Result<Self, UsageError> {
        self.update(|e| e.set_outcome(Outcome::Rows(rows)))
    }

    /// Returns `result` when matched. Only for statements.
    pub fn will_return_result(self, result: ExecResult) -> Result<Self, UsageError> {
        self.update(|e| e.set_outcome(Outcome::Result(result)))
    }

    /// Fails the matched call with `err`, which reaches the caller as
    /// [`Error::Driver`].
    pub fn will_return_error<E>(self, err: E) -> Result<Self, UsageError>
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let err: Arc<dyn std::error::Error + Send + Sync> = Arc::from(err.into());
        self.update(|e| e.set_outcome(Outcome::Error(err)))
    }

    fn update(
        self,
        f: impl FnOnce(&mut Expectation) -> Result<(), UsageError>,
    ) -> Result<Self, UsageError> {
        {
            let mut inner = self.shared.inner.lock();
            if inner.state == SessionState::Closed {
                return Err(UsageError::SessionClosed);
            }
            if let Some(expectation) = inner.queue.get_mut(self.idx) {
                f(expectation)?;
            }
        }
        Ok(self)
    }
}
