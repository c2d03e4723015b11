pub mod config;
pub mod error;
pub mod feed;
pub mod notifier;
pub mod types;

pub use config::{Config, NotifyMode};
pub use error::{Error, Result};
pub use feed::PriceFeed;
pub use notifier::Notifier;
pub use types::*;
