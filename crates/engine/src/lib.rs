pub mod moralis;
pub mod scheduler;
pub mod tracker;

pub use moralis::MoralisClient;
pub use scheduler::{Scheduler, TickReport};
pub use tracker::{Tracker, TrackerSettings};
