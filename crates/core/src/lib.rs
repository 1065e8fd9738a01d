pub mod config;
pub mod error;
pub mod pattern;
pub mod trace;

pub use config::Config;
pub use error::*;
pub use pattern::Pattern;
pub use trace::{Event, Trace};
