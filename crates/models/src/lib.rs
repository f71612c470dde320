//! Wire models shared by the composite service and its backends.
//! - `product`, `recommendation`, `review`: entities exchanged with the backing services
//! - `composite`: the aggregate returned to callers of `/product-composite`
//! - `error_info`: the `{status, message, path}` error envelope used in both directions

pub mod composite;
pub mod error_info;
pub mod product;
pub mod recommendation;
pub mod review;

pub use composite::{ProductAggregate, RecommendationSummary, ReviewSummary, ServiceAddresses};
pub use error_info::HttpErrorInfo;
pub use product::Product;
pub use recommendation::Recommendation;
pub use review::Review;
