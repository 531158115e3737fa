pub mod analysis;
pub mod api;
pub mod reaper;
pub mod repository;
pub mod roast;
pub mod runner;

pub use analysis::{MAX_BATCH_SIZE, MIN_BATCH_SIZE};
pub use api::{AppState, router};
pub use reaper::{remove_all_snapshots, run_reaper};
pub use runner::{JobContext, JobHandle, JobRunner, Procedure};
