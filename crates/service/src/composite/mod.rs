//! Composite product aggregation: read, create, delete over three backends.

pub mod service;

pub use service::{CompositeConfig, ProductCompositeService, SubResourcePolicy};
