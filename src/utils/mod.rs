//! Shared utilities: lossy log reading, log file naming, decimal rounding.

pub mod lines;
pub mod naming;
pub mod rounding;

pub use lines::open_log;
pub use naming::LogNaming;
pub use rounding::{format_float, round_half_even, round_to};
