use serde::{Deserialize, Serialize};

use crate::composite::ReviewSummary;

/// Review as served by the review backend.
/// Identity on the backend side is (`product_id`, `review_id`).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub product_id: i32,
    pub review_id: i32,
    pub author: String,
    pub subject: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_address: Option<String>,
}

impl Review {
    pub fn from_summary(product_id: i32, summary: &ReviewSummary) -> Self {
        Self {
            product_id,
            review_id: summary.review_id,
            author: summary.author.clone(),
            subject: summary.subject.clone(),
            content: summary.content.clone(),
            service_address: None,
        }
    }

    pub fn to_summary(&self) -> ReviewSummary {
        ReviewSummary {
            review_id: self.review_id,
            author: self.author.clone(),
            subject: self.subject.clone(),
            content: self.content.clone(),
        }
    }
}
