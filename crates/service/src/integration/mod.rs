//! Backing clients: one per resource kind.
//!
//! Clients translate transport and protocol failures into `ServiceError` and
//! carry no business policy: no caching, no retry, no cross-backend logic.

use async_trait::async_trait;
use models::{Product, Recommendation, Review};

use crate::errors::ServiceError;

pub mod http;
pub mod mock;
pub mod product;
pub mod recommendation;
pub mod review;

pub use http::HttpClientConfig;
pub use product::HttpProductClient;
pub use recommendation::HttpRecommendationClient;
pub use review::HttpReviewClient;

/// Which backing service a call went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Product,
    Recommendation,
    Review,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Product => "product",
            Backend::Recommendation => "recommendation",
            Backend::Review => "review",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait ProductClient: Send + Sync {
    /// Absent product is `NotFound`.
    async fn get_product(&self, product_id: i32) -> Result<Product, ServiceError>;
    async fn create_product(&self, body: &Product) -> Result<Product, ServiceError>;
    /// Absent product is `NotFound`; the aggregator decides whether that matters.
    async fn delete_product(&self, product_id: i32) -> Result<(), ServiceError>;
}

#[async_trait]
pub trait RecommendationClient: Send + Sync {
    /// No recommendations for the product is an empty list, not an error.
    async fn get_recommendations(&self, product_id: i32) -> Result<Vec<Recommendation>, ServiceError>;
    async fn create_recommendation(&self, body: &Recommendation) -> Result<Recommendation, ServiceError>;
    /// Bulk delete by product id; zero matches is success.
    async fn delete_recommendations(&self, product_id: i32) -> Result<(), ServiceError>;
}

#[async_trait]
pub trait ReviewClient: Send + Sync {
    async fn get_reviews(&self, product_id: i32) -> Result<Vec<Review>, ServiceError>;
    async fn create_review(&self, body: &Review) -> Result<Review, ServiceError>;
    async fn delete_reviews(&self, product_id: i32) -> Result<(), ServiceError>;
}
