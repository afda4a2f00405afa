//! Cache coordinator.
//!
//! One cache per cache-enabled model. Operations on a model lock its cache
//! for their whole duration, so a read never observes a half-applied
//! mutation.

mod clock;
mod coordinator;
mod data_cache;

pub use clock::{Clock, ManualClock, SystemClock};
pub use coordinator::{CacheCoordinator, CacheHandle, CacheStats};
pub use data_cache::{CacheState, DataCache};
