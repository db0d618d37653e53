//! Utility functions
//!
//! Provides the logging sink, rotated log files and connection id allocation.

pub mod logging;
pub mod rolling;
pub mod snowflake;

pub use logging::Logger;
pub use rolling::Rotation;
pub use snowflake::{IdAllocator, Snowflake};
