use crate::errors::TrackerError;
use crate::ledger::Tracker;
use std::path::Path;
use tokio::fs;
use tracing::error;

pub async fn load_data(path: &Path) -> Tracker {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(tracker) => tracker,
            Err(err) => {
                error!("failed to parse data file: {err}");
                Tracker::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Tracker::default(),
        Err(err) => {
            error!("failed to read data file: {err}");
            Tracker::default()
        }
    }
}

/// Writes through a sibling temp file so the data file is never left half-written.
pub async fn persist_data(path: &Path, tracker: &Tracker) -> Result<(), TrackerError> {
    let payload = serde_json::to_vec_pretty(tracker)?;
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, payload).await?;
    fs::rename(&staging, path).await?;
    Ok(())
}
