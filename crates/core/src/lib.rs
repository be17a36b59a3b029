pub mod error;
pub mod order;
pub mod poll;
pub mod source;
pub mod state;
pub mod transition;

pub use error::{AuthError, FeedError, StateError};
pub use order::Order;
pub use poll::{CycleOutcome, CycleReport, PollLoop, PollSettings};
pub use source::{AccessToken, Notifier, OrderSource, TokenSource};
pub use state::{Snapshot, SnapshotLoad, StateStore};
pub use transition::TransitionRule;
