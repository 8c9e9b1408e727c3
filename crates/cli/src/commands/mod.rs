//! Command implementations for the taskforge CLI.

pub mod onboard;
pub mod providers;
pub mod run;
