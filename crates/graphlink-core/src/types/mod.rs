//! Core types for graphlink.

mod correspondence;
mod node;
mod summary;

pub use correspondence::*;
pub use node::*;
pub use summary::*;
