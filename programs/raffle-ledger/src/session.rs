use crate::config::LedgerConfig;
use crate::store::Tables;

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Write capability handed to every mutating operation.
///
/// Only exists inside a serializable transaction, so reading the chain tail
/// and appending after it cannot interleave with another writer.
pub struct LedgerSession<'a> {
    pub tables: &'a mut Tables,
    pub config: &'a LedgerConfig,
    /// One clock reading per transaction; every row it writes shares it.
    pub now: i64,
}

impl<'a> LedgerSession<'a> {
    pub fn new(tables: &'a mut Tables, config: &'a LedgerConfig) -> Self {
        Self::at(tables, config, now_millis())
    }

    pub fn at(tables: &'a mut Tables, config: &'a LedgerConfig, now: i64) -> Self {
        Self { tables, config, now }
    }
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
