use serde::{Deserialize, Serialize};

/// Product as served by the product backend (`/product`).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub product_id: i32,
    pub name: String,
    pub weight: i32,
    /// 响应该请求的后端实例地址（host:port），发往后端时不携带
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_address: Option<String>,
}

impl Product {
    pub fn new(product_id: i32, name: impl Into<String>, weight: i32) -> Self {
        Self { product_id, name: name.into(), weight, service_address: None }
    }
}
