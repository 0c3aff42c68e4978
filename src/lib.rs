pub mod achievements;
pub mod analysis;
pub mod app;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod ledger;
pub mod models;
pub mod schedule;
pub mod state;
pub mod storage;
pub mod streak;
pub mod sweeper;

pub use app::router;
pub use config::Config;
pub use ledger::{LedgerPolicy, Tracker};
pub use state::AppState;
pub use storage::load_data;
