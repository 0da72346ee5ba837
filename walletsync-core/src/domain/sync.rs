//! Sync queue and status types

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Unit of work in the sync queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncTaskKind {
    /// Discover accounts and refresh wallet metadata
    FetchAccountInfo,
    /// Fetch and reconcile one account's statement
    FetchStatement { account_id: String },
}

/// A queued task; lives only for the current run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncTask {
    pub kind: SyncTaskKind,
    pub created_at: DateTime<Utc>,
}

impl SyncTask {
    pub fn account_info(created_at: DateTime<Utc>) -> Self {
        Self {
            kind: SyncTaskKind::FetchAccountInfo,
            created_at,
        }
    }

    pub fn statement(account_id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            kind: SyncTaskKind::FetchStatement {
                account_id: account_id.into(),
            },
            created_at,
        }
    }

    /// Remote account this task targets, if any
    pub fn account_id(&self) -> Option<&str> {
        match &self.kind {
            SyncTaskKind::FetchAccountInfo => None,
            SyncTaskKind::FetchStatement { account_id } => Some(account_id),
        }
    }
}

/// Published sync status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncStatus {
    Idle,
    Syncing { progress: String },
    WaitingForRateLimit { seconds_remaining: u64 },
    Completed { accounts: usize, transactions: usize },
    Failed { reason: String },
}

impl SyncStatus {
    pub fn syncing(progress: impl Into<String>) -> Self {
        SyncStatus::Syncing {
            progress: progress.into(),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        SyncStatus::Failed {
            reason: reason.into(),
        }
    }

    /// Completed or failed
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncStatus::Completed { .. } | SyncStatus::Failed { .. })
    }
}

/// Immutable view of coordinator state for observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSnapshot {
    pub status: SyncStatus,
    pub queue_depth: usize,
    pub is_processing: bool,
    pub last_success_at: Option<DateTime<Utc>>,
}

impl Default for SyncSnapshot {
    fn default() -> Self {
        Self {
            status: SyncStatus::Idle,
            queue_depth: 0,
            is_processing: false,
            last_success_at: None,
        }
    }
}
