//! Change notification primitives (publish/subscribe).

pub mod bus;
pub mod replay_latest;

pub use bus::{EventBus, Subscription};
pub use replay_latest::{BusError, ReplayLatestBus};
