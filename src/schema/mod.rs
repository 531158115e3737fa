pub mod analysis;
pub mod api;
pub mod explore;
pub mod job;
pub mod roast;

pub use analysis::*;
pub use api::*;
pub use explore::*;
pub use job::*;
pub use roast::*;
