use pretty_assertions::assert_eq;
use sqlmock::{params, AsyncConn, Error, ExecResult, Rows, SessionState};

const PENDING: i64 = 0;
const CANCELLED: i64 = 2;

#[derive(Debug)]
struct DeadlockError;

impl std::fmt::Display for DeadlockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "deadlock detected")
    }
}

impl std::error::Error for DeadlockError {}

fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Cancels the order if it is still pending. Returns whether it was cancelled.
async fn cancel_order<C>(conn: &mut C, id: i64) -> Result<bool, Error>
where
    C: AsyncConn<Error = Error> + ?Sized,
{
    conn.begin().await?;
    match try_cancel(conn, id).await {
        Ok(true) => {
            conn.commit().await?;
            Ok(true)
        }
        Ok(false) => {
            conn.rollback().await?;
            Ok(false)
        }
        Err(e) => {
            conn.rollback().await?;
            Err(e)
        }
    }
}

async fn try_cancel<C>(conn: &mut C, id: i64) -> Result<bool, Error>
where
    C: AsyncConn<Error = Error> + ?Sized,
{
    let rows = conn
        .query(
            "SELECT id, status FROM orders WHERE id = ? FOR UPDATE",
            &params![id],
        )
        .await?;
    let status = rows
        .into_iter()
        .next()
        .and_then(|row| row.get_by_name("status").and_then(|v| v.as_i64()));
    if status != Some(PENDING) {
        return Ok(false);
    }
    conn.exec(
        "UPDATE orders SET status = ? WHERE id = ?",
        &params![CANCELLED, id],
    )
    .await?;
    Ok(true)
}

#[tokio::test]
async fn test_not_pending_rolls_back() {
    init_logging();
    let (mut conn, mock) = sqlmock::new();
    mock.expect_begin().unwrap();
    mock.expect_query("SELECT (.+) FROM orders")
        .unwrap()
        .with_args([1])
        .unwrap()
        .will_return_rows(Rows::new(["id", "status"]).add_csv_rows("1,1").unwrap())
        .unwrap();
    mock.expect_rollback().unwrap();

    assert_eq!(cancel_order(&mut conn, 1).await.unwrap(), false);
    assert_eq!(conn.state(), SessionState::Idle);
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_pending_is_cancelled() {
    init_logging();
    let (mut conn, mock) = sqlmock::new();
    mock.expect_begin().unwrap();
    mock.expect_query("SELECT (.+) FROM orders")
        .unwrap()
        .with_args([1])
        .unwrap()
        .will_return_rows(
            Rows::new(["id", "status"])
                .add_row([1, PENDING])
                .unwrap(),
        )
        .unwrap();
    mock.expect_exec("UPDATE orders SET status")
        .unwrap()
        .with_args([CANCELLED, 1])
        .unwrap()
        .will_return_result(ExecResult::new(0, 1))
        .unwrap();
    mock.expect_commit().unwrap();

    assert_eq!(cancel_order(&mut conn, 1).await.unwrap(), true);
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_failed_update_rolls_back() {
    init_logging();
    let (mut conn, mock) = sqlmock::new();
    mock.expect_begin().unwrap();
    mock.expect_query("SELECT (.+) FROM orders")
        .unwrap()
        .will_return_rows(Rows::new(["id", "status"]).add_csv_rows("1,0").unwrap())
        .unwrap();
    mock.expect_exec("UPDATE orders")
        .unwrap()
        .will_return_error(DeadlockError)
        .unwrap();
    mock.expect_rollback().unwrap();

    let err = cancel_order(&mut conn, 1).await.unwrap_err();
    assert!(err
        .driver_error()
        .unwrap()
        .downcast_ref::<DeadlockError>()
        .is_some());
    assert_eq!(err.to_string(), "deadlock detected");
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_missing_rollback_is_reported_on_close() {
    init_logging();
    let (mut conn, mock) = sqlmock::new();
    mock.expect_begin().unwrap();
    mock.expect_query("SELECT (.+) FROM orders")
        .unwrap()
        .will_return_rows(Rows::new(["id", "status"]).add_csv_rows("1,1").unwrap())
        .unwrap();
    mock.expect_commit().unwrap();

    // the code rolls back where a commit was expected
    let err = cancel_order(&mut conn, 1).await.unwrap_err();
    assert!(err.is_mismatch());
    assert_eq!(conn.state(), SessionState::InTransaction);

    let err = conn.close().await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "there are 1 unfulfilled expectations:\n  - commit"
    );
}

#[tokio::test]
async fn test_code_under_test_through_boxed_connection() {
    init_logging();
    let (_conn, mock) = sqlmock::new();
    mock.expect_begin().unwrap();
    mock.expect(sqlmock::ExpectationKind::Query).unwrap();
    mock.expect_rollback().unwrap();

    let mut conn = sqlmock::registry::open("sqlmock", mock.dsn()).unwrap();
    // no rows at all reads as "not pending"
    assert_eq!(cancel_order(&mut *conn, 7).await.unwrap(), false);
    mock.expectations_were_met().unwrap();
}
