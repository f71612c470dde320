use async_trait::async_trait;
use models::Recommendation;
use tracing::debug;

use super::http::{read_json, send, trim_base};
use super::{Backend, RecommendationClient};
use crate::errors::{ensure_valid_product_id, ServiceError};

/// Client for `/recommendation?productId={id}` and `POST /recommendation`.
#[derive(Clone)]
pub struct HttpRecommendationClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpRecommendationClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self { http, base_url: trim_base(base_url) }
    }

    fn url(&self) -> String {
        format!("{}/recommendation", self.base_url)
    }
}

#[async_trait]
impl RecommendationClient for HttpRecommendationClient {
    async fn get_recommendations(&self, product_id: i32) -> Result<Vec<Recommendation>, ServiceError> {
        ensure_valid_product_id(product_id)?;
        debug!(url = %self.url(), product_id, "Will call getRecommendations API");
        let subject = format!("Recommendations for productId: {product_id}");
        let request = self.http.get(self.url()).query(&[("productId", product_id)]);
        match send(Backend::Recommendation, request, &subject).await {
            Ok(response) => {
                let list: Vec<Recommendation> = read_json(Backend::Recommendation, response, &subject).await?;
                debug!(product_id, size = list.len(), "recommendation response");
                Ok(list)
            }
            // 后端对不存在的产品返回 404 时，视为空列表
            Err(ServiceError::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn create_recommendation(&self, body: &Recommendation) -> Result<Recommendation, ServiceError> {
        ensure_valid_product_id(body.product_id)?;
        debug!(url = %self.url(), product_id = body.product_id, recommendation_id = body.recommendation_id, "Will post a new recommendation");
        let subject = format!(
            "Product Id: {}, Recommendation Id: {}",
            body.product_id, body.recommendation_id
        );
        let response = send(Backend::Recommendation, self.http.post(self.url()).json(body), &subject).await?;
        read_json(Backend::Recommendation, response, &subject).await
    }

    async fn delete_recommendations(&self, product_id: i32) -> Result<(), ServiceError> {
        ensure_valid_product_id(product_id)?;
        debug!(url = %self.url(), product_id, "Will call the deleteRecommendations API");
        let subject = format!("Recommendations for productId: {product_id}");
        let request = self.http.delete(self.url()).query(&[("productId", product_id)]);
        send(Backend::Recommendation, request, &subject).await?;
        Ok(())
    }
}
