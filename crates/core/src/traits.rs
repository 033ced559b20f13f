//! Capabilities the extraction pipeline consumes. Concrete implementations
//! live in `finsight-extract` (generation, in-memory categories) and
//! `finsight-storage` (SQLite).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::category::{CategoryId, Direction, UserId};
use crate::transaction::ResolvedTransaction;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Generation request failed: {0}")]
    Transport(String),
    #[error("Generation backend returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Malformed generation response: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Category directory unavailable: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Transaction store rejected the write: {0}")]
    Backend(String),
    #[error("Amount {0} is out of range for storage")]
    AmountOutOfRange(String),
}

/// Text-generation model. One call per extraction; callers never retry.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;

    fn model_name(&self) -> &str;
}

/// Whether a directory serves one taxonomy for everybody or one per user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryScope {
    Global,
    PerUser,
}

#[async_trait]
pub trait CategoryDirectory: Send + Sync {
    fn scope(&self) -> CategoryScope;

    /// Exact-name lookup within the set for `direction`. Global directories ignore `user_id`.
    async fn lookup(
        &self,
        name: &str,
        direction: Direction,
        user_id: UserId,
    ) -> Result<Option<CategoryId>, DirectoryError>;

    /// Category names for `direction`, in directory order.
    async fn list(&self, user_id: UserId, direction: Direction) -> Result<Vec<String>, DirectoryError>;
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn insert(&self, tx: &ResolvedTransaction) -> Result<(), StoreError>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always reports the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
