//! Persisted sync bookkeeping port

use chrono::{DateTime, Utc};

use crate::domain::result::Result;

/// Small key-value state the coordinator keeps between runs
pub trait SyncStateStore: Send + Sync {
    fn last_success_at(&self) -> Result<Option<DateTime<Utc>>>;

    fn set_last_success_at(&self, at: DateTime<Utc>) -> Result<()>;

    /// Remote account ids discovered by the last account refresh
    fn cached_account_ids(&self) -> Result<Vec<String>>;

    fn set_cached_account_ids(&self, ids: &[String]) -> Result<()>;

    /// When the last rate-limited remote call was dispatched
    fn last_remote_call_at(&self) -> Result<Option<DateTime<Utc>>>;

    fn set_last_remote_call_at(&self, at: DateTime<Utc>) -> Result<()>;

    /// Earliest time the remote may be called again after it answered 429
    fn backoff_until(&self) -> Result<Option<DateTime<Utc>>>;

    fn set_backoff_until(&self, until: DateTime<Utc>) -> Result<()>;
}
