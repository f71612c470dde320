use async_trait::async_trait;
use models::Product;
use tracing::debug;

use super::http::{read_json, send, trim_base};
use super::{Backend, ProductClient};
use crate::errors::{ensure_valid_product_id, ServiceError};

/// Client for `GET/DELETE /product/{id}` and `POST /product`.
#[derive(Clone)]
pub struct HttpProductClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpProductClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self { http, base_url: trim_base(base_url) }
    }

    fn url(&self, product_id: Option<i32>) -> String {
        match product_id {
            Some(id) => format!("{}/product/{}", self.base_url, id),
            None => format!("{}/product", self.base_url),
        }
    }
}

#[async_trait]
impl ProductClient for HttpProductClient {
    async fn get_product(&self, product_id: i32) -> Result<Product, ServiceError> {
        ensure_valid_product_id(product_id)?;
        let url = self.url(Some(product_id));
        debug!(%url, "Will call getProduct API");
        let subject = format!("Product Id: {product_id}");
        let response = send(Backend::Product, self.http.get(&url), &subject).await?;
        read_json(Backend::Product, response, &subject).await
    }

    async fn create_product(&self, body: &Product) -> Result<Product, ServiceError> {
        ensure_valid_product_id(body.product_id)?;
        let url = self.url(None);
        debug!(%url, product_id = body.product_id, "Will post a new product");
        let subject = format!("Product Id: {}", body.product_id);
        let response = send(Backend::Product, self.http.post(&url).json(body), &subject).await?;
        read_json(Backend::Product, response, &subject).await
    }

    async fn delete_product(&self, product_id: i32) -> Result<(), ServiceError> {
        ensure_valid_product_id(product_id)?;
        let url = self.url(Some(product_id));
        debug!(%url, "Will call the deleteProduct API");
        let subject = format!("Product Id: {product_id}");
        send(Backend::Product, self.http.delete(&url), &subject).await?;
        Ok(())
    }
}
