//! Data layer: queue substrate, object store, status registry, vector store

pub mod queue;
pub mod registry;
pub mod store;
pub mod vector;
