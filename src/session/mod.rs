//! Session layer
//!
//! The embeddable handle hosts interact with: lifecycle, parameters and
//! datagram hand-off.

mod config;
mod output;
#[allow(clippy::module_inception)]
mod session;

pub use config::{NoDelayConfig, SessionConfig};
pub use output::OutputMode;
pub use session::{Session, SessionStats};
