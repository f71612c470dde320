use async_trait::async_trait;
use models::Review;
use tracing::debug;

use super::http::{read_json, send, trim_base};
use super::{Backend, ReviewClient};
use crate::errors::{ensure_valid_product_id, ServiceError};

/// Client for `/review?productId={id}` and `POST /review`.
#[derive(Clone)]
pub struct HttpReviewClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpReviewClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self { http, base_url: trim_base(base_url) }
    }

    fn url(&self) -> String {
        format!("{}/review", self.base_url)
    }
}

#[async_trait]
impl ReviewClient for HttpReviewClient {
    async fn get_reviews(&self, product_id: i32) -> Result<Vec<Review>, ServiceError> {
        ensure_valid_product_id(product_id)?;
        debug!(url = %self.url(), product_id, "Will call getReviews API");
        let subject = format!("Reviews for productId: {product_id}");
        let request = self.http.get(self.url()).query(&[("productId", product_id)]);
        match send(Backend::Review, request, &subject).await {
            Ok(response) => read_json(Backend::Review, response, &subject).await,
            Err(ServiceError::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn create_review(&self, body: &Review) -> Result<Review, ServiceError> {
        ensure_valid_product_id(body.product_id)?;
        debug!(url = %self.url(), product_id = body.product_id, review_id = body.review_id, "Will post a new review");
        let subject = format!("Product Id: {}, Review Id: {}", body.product_id, body.review_id);
        let response = send(Backend::Review, self.http.post(self.url()).json(body), &subject).await?;
        read_json(Backend::Review, response, &subject).await
    }

    async fn delete_reviews(&self, product_id: i32) -> Result<(), ServiceError> {
        ensure_valid_product_id(product_id)?;
        debug!(url = %self.url(), product_id, "Will call the deleteReviews API");
        let subject = format!("Reviews for productId: {product_id}");
        let request = self.http.delete(self.url()).query(&[("productId", product_id)]);
        send(Backend::Review, request, &subject).await?;
        Ok(())
    }
}
