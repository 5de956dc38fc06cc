//! Process-wide registry of drivers, looked up by name.
//!
//! The mock driver is always registered as [`MOCK_DRIVER`], so a program under test
//! can reach a mock session with the same [`open`] call it uses for a real database:
//!
//! ```
//! # async fn run() -> Result<(), sqlmock::Error> {
//! let (_conn, mock) = sqlmock::new();
//! mock.expect_begin()?;
//!
//! let mut conn = sqlmock::registry::open("sqlmock", mock.dsn())?;
//! conn.begin().await?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::{Mutex, RwLock};

use crate::session::Shared;
use crate::{BoxConn, Driver, Error, MockConn};

/// Name of the mock driver.
pub const MOCK_DRIVER: &str = "sqlmock";

fn drivers_map() -> &'static RwLock<HashMap<String, Arc<dyn Driver>>> {
    static DRIVERS: OnceLock<RwLock<HashMap<String, Arc<dyn Driver>>>> = OnceLock::new();
    DRIVERS.get_or_init(|| {
        let mut drivers: HashMap<String, Arc<dyn Driver>> = HashMap::new();
        drivers.insert(MOCK_DRIVER.to_string(), Arc::new(MockDriver));
        RwLock::new(drivers)
    })
}

/// Registers `driver` under `name`. Names are unique for the life of the process.
pub fn register(name: &str, driver: impl Driver + 'static) -> Result<(), Error> {
    use std::collections::hash_map::Entry;

    match drivers_map().write().entry(name.to_string()) {
        Entry::Occupied(_) => Err(Error::DuplicateDriver(name.to_string())),
        Entry::Vacant(v) => {
            tracing::info!(driver = name, "driver registered");
            v.insert(Arc::new(driver));
            Ok(())
        }
    }
}

/// Opens a connection with the driver registered under `name`.
pub fn open(name: &str, dsn: &str) -> Result<BoxConn, Error> {
    let driver = drivers_map()
        .read()
        .get(name)
        .cloned()
        .ok_or_else(|| Error::UnknownDriver(name.to_string()))?;
    driver.open(dsn)
}

/// Names of all registered drivers, sorted.
pub fn drivers() -> Vec<String> {
    let mut names: Vec<_> = drivers_map().read().keys().cloned().collect();
    names.sort();
    names
}

/// Open mock sessions by connection string.
fn sessions() -> &'static Mutex<HashMap<String, Weak<Shared>>> {
    static SESSIONS: OnceLock<Mutex<HashMap<String, Weak<Shared>>>> = OnceLock::new();
    SESSIONS.get_or_init(Default::default)
}

pub(crate) fn remember_session(shared: &Arc<Shared>) -> Result<(), Error> {
    let mut sessions = sessions().lock();
    // sessions dropped without being closed leave a dead entry behind
    sessions.retain(|_, s| s.strong_count() > 0);
    if sessions.contains_key(&shared.dsn) {
        return Err(Error::DuplicateDsn(shared.dsn.clone()));
    }
    sessions.insert(shared.dsn.clone(), Arc::downgrade(shared));
    Ok(())
}

pub(crate) fn forget_session(dsn: &str) {
    sessions().lock().remove(dsn);
}

/// The driver handing out connections onto open mock sessions.
///
/// The connection string selects the session; it is the one reported by
/// [`Sqlmock::dsn`](crate::Sqlmock::dsn).
#[derive(Debug, Clone, Copy)]
pub struct MockDriver;

impl Driver for MockDriver {
    fn open(&self, dsn: &str) -> Result<BoxConn, Error> {
        let shared = sessions()
            .lock()
            .get(dsn)
            .and_then(Weak::upgrade)
            .ok_or_else(|| Error::UnknownDsn(dsn.to_string()))?;
        tracing::debug!(dsn, "mock connection opened");
        Ok(Box::new(MockConn::new(shared)))
    }
}
