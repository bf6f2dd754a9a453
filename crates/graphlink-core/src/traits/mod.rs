//! Core traits for graphlink providers.

mod graph_store;

pub use graph_store::*;
