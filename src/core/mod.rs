//! Core types shared by every layer: constants, errors, serial-number
//! arithmetic and the host output trait.

pub mod constants;
mod error;
pub mod serial;
mod traits;

pub use error::*;
pub use traits::*;
