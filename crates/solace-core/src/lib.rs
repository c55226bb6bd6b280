//! solace/crates/solace-core/src/lib.rs
//!
//! The central domain model and interface definitions for Solace.

pub mod models;
pub mod traits;
pub mod error;

// Re-exporting for easier access in other crates
pub use models::*;
pub use traits::*;
pub use error::*;
