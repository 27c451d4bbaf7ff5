//! # Utilities Module
//!
//! Grid reachability, time sources and formatting helpers.

pub mod clock;
pub mod format;
pub mod pathfinding;

pub use clock::*;
pub use format::*;
pub use self::pathfinding::*;
