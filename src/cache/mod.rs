//! Generational response cache with offline fallback.
//!
//! This module provides a two-tier cache that:
//! - Precaches a fixed manifest of static assets per generation
//! - Stores successful GET responses opportunistically (last write wins)
//! - Serves cached responses, or an offline page for navigations, when the
//!   network is unavailable
//! - Retires every stale generation when a new one is activated

mod layer;
mod storage;
mod traits;

pub use layer::ResponseCache;
pub use storage::SqliteStorage;
pub use traits::{FetchOutcome, HttpResponse, Network, Request};
