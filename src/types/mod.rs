//! Data types shared by the live client, the REST client and the cache

mod bead;
mod filter;
mod state;
mod stats;

pub use bead::{
    priority_label, Bead, BeadDetailResponse, BeadType, BeadsResponse, Comment, Dependency,
    EpicProgress, Health, Status,
};
pub use filter::Filter;
pub use state::{ConnectionPhase, LiveState};
pub use stats::{Stats, Velocity};
