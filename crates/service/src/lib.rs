//! Aggregation core for the product composite service.
//! - `integration`: one backing client per resource kind (HTTP + in-memory doubles).
//! - `normalizer`: maps raw backend failures onto the `ServiceError` taxonomy.
//! - `composite`: fans out to the clients and assembles `ProductAggregate`s.
//! - `retry` / `observability`: retry policy for idempotent calls and Prometheus metrics.

pub mod composite;
pub mod errors;
pub mod integration;
pub mod normalizer;
pub mod observability;
pub mod retry;

pub use composite::{CompositeConfig, ProductCompositeService, SubResourcePolicy};
pub use errors::{ErrorKind, ServiceError};
