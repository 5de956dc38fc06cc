//! Mock SQL driver for testing database code.
//!
//! A program under test drives a [`MockConn`] exactly as it would a real connection.
//! Instead of talking to a database, the connection replies with rows, results or
//! errors programmed up front, and fails any call that does not match the next
//! declared expectation.
//!
//! # Usage
//!
//! Declare the interactions you expect on the [`Sqlmock`] handle, in order, then run
//! the code under test against the connection. Closing the connection checks that
//! every expectation was consumed.
//!
//! ```
//! use sqlmock::{params, Conn, Rows};
//!
//! # fn main() -> Result<(), sqlmock::Error> {
//! let (mut conn, mock) = sqlmock::new();
//! mock.expect_begin()?;
//! mock.expect_query("SELECT (.+) FROM orders")?
//!     .with_args([1])?
//!     .will_return_rows(Rows::new(["id", "status"]).add_csv_rows("1,1")?)?;
//! mock.expect_rollback()?;
//!
//! conn.begin()?;
//! let rows = conn.query("SELECT id, status FROM orders WHERE id = ?", &params![1])?;
//! assert_eq!(rows.len(), 1);
//! conn.rollback()?;
//!
//! conn.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! The mock is also registered as the `sqlmock` driver, so code that opens its
//! connections by driver name through [`registry::open`] can be pointed at it with
//! [`Sqlmock::dsn`].

pub mod connection;
pub mod error;
pub mod expectation;
pub mod mock;
pub mod pattern;
pub mod registry;
pub mod rows;
pub mod session;
pub mod value;

mod queue;

pub use self::connection::*;
pub use self::error::*;
pub use self::expectation::{ExpectationKind, ExpectationSummary};
pub use self::mock::*;
pub use self::pattern::{Pattern, QueryMatcher};
pub use self::rows::*;
pub use self::session::{MockConn, MockStatement, SessionState};
pub use self::value::*;
