//! Repository implementations for database operations

pub mod scan;

pub use scan::*;
