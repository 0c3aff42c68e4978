use crate::errors::TrackerError;
use crate::ledger::{LedgerPolicy, Tracker};
use crate::models::SweepReport;
use crate::storage::persist_data;
use chrono::{DateTime, Utc};
use std::{path::PathBuf, sync::Arc};
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct AppState {
    pub data_path: PathBuf,
    pub tracker: Arc<RwLock<Tracker>>,
    pub policy: LedgerPolicy,
}

impl AppState {
    pub fn new(data_path: PathBuf, tracker: Tracker, policy: LedgerPolicy) -> Self {
        Self {
            data_path,
            tracker: Arc::new(RwLock::new(tracker)),
            policy,
        }
    }

    /// Runs `apply` against a copy of the tracker and swaps it in once persisted.
    ///
    /// Writers are serialized by the lock; on any error the copy is dropped and
    /// neither memory nor disk changes.
    pub async fn transact<T>(
        &self,
        apply: impl FnOnce(&mut Tracker) -> Result<T, TrackerError>,
    ) -> Result<T, TrackerError> {
        let mut current = self.tracker.write().await;
        let mut draft = current.clone();
        let output = apply(&mut draft)?;
        if draft != *current {
            persist_data(&self.data_path, &draft).await?;
            *current = draft;
        }
        Ok(output)
    }

    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, TrackerError> {
        let policy = self.policy;
        self.transact(|tracker| tracker.expire_overdue(now, &policy))
            .await
    }
}
