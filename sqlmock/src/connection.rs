//! The driver contract a program under test codes against.

use async_trait::async_trait;

use crate::{Error, ExecResult, Rows, Value};

/// A database connection.
pub trait Conn: Send {
    /// The error type of driver calls.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Starts a transaction.
    fn begin(&mut self) -> Result<(), Self::Error>;

    /// Runs a query with bound parameters and returns its rows.
    fn query(&mut self, sql: &str, args: &[Value]) -> Result<Rows, Self::Error>;

    /// Runs a statement with bound parameters and returns its summary.
    fn exec(&mut self, sql: &str, args: &[Value]) -> Result<ExecResult, Self::Error>;

    fn commit(&mut self) -> Result<(), Self::Error>;

    fn rollback(&mut self) -> Result<(), Self::Error>;

    /// Closes the connection. Closing twice is a no-op.
    fn close(&mut self) -> Result<(), Self::Error>;

    /// Engine name of current database.
    fn engine_name(&self) -> &str {
        ""
    }
}

/// The async database connection.
#[async_trait]
pub trait AsyncConn: Send {
    /// The error type of driver calls.
    type Error: std::error::Error + Send + Sync + 'static;

    async fn begin(&mut self) -> Result<(), Self::Error>;

    async fn query(&mut self, sql: &str, args: &[Value]) -> Result<Rows, Self::Error>;

    async fn exec(&mut self, sql: &str, args: &[Value]) -> Result<ExecResult, Self::Error>;

    async fn commit(&mut self) -> Result<(), Self::Error>;

    async fn rollback(&mut self) -> Result<(), Self::Error>;

    async fn close(&mut self) -> Result<(), Self::Error>;

    /// Engine name of current database.
    fn engine_name(&self) -> &str {
        ""
    }
}

/// Compat-layer for the async and blocking connection traits.
#[async_trait]
impl<C> AsyncConn for C
where
    C: Conn,
{
    type Error = <C as Conn>::Error;

    async fn begin(&mut self) -> Result<(), Self::Error> {
        <C as Conn>::begin(self)
    }

    async fn query(&mut self, sql: &str, args: &[Value]) -> Result<Rows, Self::Error> {
        <C as Conn>::query(self, sql, args)
    }

    async fn exec(&mut self, sql: &str, args: &[Value]) -> Result<ExecResult, Self::Error> {
        <C as Conn>::exec(self, sql, args)
    }

    async fn commit(&mut self) -> Result<(), Self::Error> {
        <C as Conn>::commit(self)
    }

    async fn rollback(&mut self) -> Result<(), Self::Error> {
        <C as Conn>::rollback(self)
    }

    async fn close(&mut self) -> Result<(), Self::Error> {
        <C as Conn>::close(self)
    }

    fn engine_name(&self) -> &str {
        <C as Conn>::engine_name(self)
    }
}

/// A connection opened through the [registry](crate::registry).
pub type BoxConn = Box<dyn AsyncConn<Error = Error>>;

/// Trait for opening connections from a connection string.
pub trait Driver: Send + Sync {
    fn open(&self, dsn: &str) -> Result<BoxConn, Error>;
}

/// Open connections directly from a closure.
impl<F> Driver for F
where
    F: Fn(&str) -> Result<BoxConn, Error> + Send + Sync,
{
    fn open(&self, dsn: &str) -> Result<BoxConn, Error> {
        self(dsn)
    }
}
