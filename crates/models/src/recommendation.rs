use serde::{Deserialize, Serialize};

use crate::composite::RecommendationSummary;

/// Recommendation as served by the recommendation backend.
/// Identity on the backend side is (`product_id`, `recommendation_id`).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub product_id: i32,
    pub recommendation_id: i32,
    pub author: String,
    pub rate: i32,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_address: Option<String>,
}

impl Recommendation {
    /// Stamp a summary from a composite payload with its owning product id.
    pub fn from_summary(product_id: i32, summary: &RecommendationSummary) -> Self {
        Self {
            product_id,
            recommendation_id: summary.recommendation_id,
            author: summary.author.clone(),
            rate: summary.rate,
            content: summary.content.clone(),
            service_address: None,
        }
    }

    pub fn to_summary(&self) -> RecommendationSummary {
        RecommendationSummary {
            recommendation_id: self.recommendation_id,
            author: self.author.clone(),
            rate: self.rate,
            content: self.content.clone(),
        }
    }
}
