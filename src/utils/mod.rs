//! Utility functions and helpers
//!
//! Common utilities used throughout the codebase.

/// Rate limiting for repeated log lines
pub mod throttle;

pub use throttle::LogThrottle;
