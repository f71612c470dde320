use serde::{Deserialize, Serialize};

/// Composite view of one product. Built fresh per read request, never stored.
///
/// On the create path the sub-resource lists and `service_addresses` may be
/// omitted from the JSON payload.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProductAggregate {
    pub product_id: i32,
    pub name: String,
    pub weight: i32,
    #[serde(default)]
    pub recommendations: Vec<RecommendationSummary>,
    #[serde(default)]
    pub reviews: Vec<ReviewSummary>,
    #[serde(default)]
    pub service_addresses: ServiceAddresses,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationSummary {
    pub recommendation_id: i32,
    pub author: String,
    pub rate: i32,
    pub content: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
    pub review_id: i32,
    pub author: String,
    pub subject: String,
    pub content: String,
}

/// Provenance of each part of an aggregate: which instance answered.
/// A field is an empty string when that part produced no result.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceAddresses {
    pub composite_product: String,
    pub product: String,
    pub recommendation: String,
    pub review: String,
}
