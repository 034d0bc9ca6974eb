//! The driver that pushes the same synthetic messages through each protocol and measures
//!  throughput, failures and message loss.

pub mod payload;
pub mod result;
pub mod runner;
