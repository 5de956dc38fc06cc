use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use pretty_assertions::assert_eq;
use sqlmock::registry::{self, MOCK_DRIVER};
use sqlmock::{any, params, BoxConn, Error, ExecResult, MockOptions, QueryMatcher};

fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[tokio::test]
async fn test_open_named_session() {
    init_logging();
    let (_conn, mock) =
        sqlmock::with_options(MockOptions::new().dsn("registry_test_orders")).unwrap();
    mock.expect_begin().unwrap();
    mock.expect_exec("DELETE FROM orders")
        .unwrap()
        .will_return_result(ExecResult::new(0, 3))
        .unwrap();
    mock.expect_commit().unwrap();

    let mut conn = registry::open(MOCK_DRIVER, "registry_test_orders").unwrap();
    assert_eq!(conn.engine_name(), "sqlmock");
    conn.begin().await.unwrap();
    let result = conn.exec("DELETE FROM orders", &[]).await.unwrap();
    assert_eq!(result.rows_affected(), 3);
    conn.commit().await.unwrap();
    conn.close().await.unwrap();

    // the session is gone once closed
    assert!(matches!(
        registry::open(MOCK_DRIVER, "registry_test_orders"),
        Err(Error::UnknownDsn(_))
    ));
}

#[test]
fn test_custom_driver() {
    init_logging();
    static OPENED: AtomicUsize = AtomicUsize::new(0);

    // a driver forwarding to mock sessions under a prefix of its own
    registry::register("registry_test_prefixed", |dsn: &str| -> Result<BoxConn, Error> {
        OPENED.fetch_add(1, Ordering::SeqCst);
        let dsn = dsn.strip_prefix("mock://").unwrap_or(dsn);
        registry::open(MOCK_DRIVER, dsn)
    })
    .unwrap();
    assert!(matches!(
        registry::register("registry_test_prefixed", |_: &str| -> Result<BoxConn, Error> {
            Err(Error::Closed)
        }),
        Err(Error::DuplicateDriver(_))
    ));
    assert!(registry::drivers().contains(&"registry_test_prefixed".to_string()));

    let (_conn, mock) = sqlmock::new();
    let dsn = format!("mock://{}", mock.dsn());
    registry::open("registry_test_prefixed", &dsn).unwrap();
    assert_eq!(OPENED.load(Ordering::SeqCst), 1);

    assert!(matches!(
        registry::open("registry_test_missing", &dsn),
        Err(Error::UnknownDriver(_))
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_prepared_statement_on_another_task() {
    init_logging();
    let (conn, mock) = sqlmock::new();
    mock.expect_exec("INSERT INTO audit")
        .unwrap()
        .with_args([1.into(), any()])
        .unwrap()
        .will_return_result(ExecResult::new(10, 1))
        .unwrap();

    let stmt = conn
        .prepare("INSERT INTO audit (order_id, at) VALUES (?, ?)")
        .unwrap();
    // preparing consumed nothing
    assert!(mock.expectations_were_met().is_err());

    let result = tokio::spawn(async move { stmt.exec(&params![1, Utc::now()]) })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result, ExecResult::new(10, 1));
    mock.expectations_were_met().unwrap();
}

#[test]
fn test_concurrent_calls_each_consume_once() {
    use sqlmock::Conn;

    init_logging();
    let (conn, mock) =
        sqlmock::with_options(MockOptions::new().query_matcher(QueryMatcher::Equal)).unwrap();
    for _ in 0..8 {
        mock.expect_exec("UPDATE counters SET n = n + 1")
            .unwrap()
            .with_args([any()])
            .unwrap();
    }

    let ok = Arc::new(AtomicUsize::new(0));
    std::thread::scope(|s| {
        for i in 0..8 {
            let mut conn = conn.clone();
            let ok = ok.clone();
            s.spawn(move || {
                conn.exec("UPDATE counters SET n = n + 1", &params![i])
                    .unwrap();
                ok.fetch_add(1, Ordering::SeqCst);
            });
        }
    });
    assert_eq!(ok.load(Ordering::SeqCst), 8);

    // every expectation was taken by exactly one call
    let mut conn = conn;
    let err = conn.exec("UPDATE counters SET n = n + 1", &params![9]).unwrap_err();
    assert!(err.is_mismatch());
    conn.close().unwrap();
}
