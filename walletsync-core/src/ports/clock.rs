//! Time source port
//!
//! The coordinator reads wall time and sleeps only through this trait so the
//! rate-limit countdown can run against a manual clock in tests.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}
