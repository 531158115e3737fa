pub mod classifier;
pub mod critic;
pub mod explorer;
pub mod fetcher;
pub mod heuristics;
pub mod selector;
pub mod store;

pub use critic::*;
pub use explorer::*;
pub use fetcher::*;
pub use store::*;
