//! Startup helpers shared by the binary entry point.

pub mod logger;
