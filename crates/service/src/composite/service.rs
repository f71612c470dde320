use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use models::{Product, ProductAggregate, Recommendation, Review, ServiceAddresses};
use tracing::{debug, info, instrument, warn};

use crate::errors::{ensure_valid_product_id, ServiceError};
use crate::integration::{Backend, ProductClient, RecommendationClient, ReviewClient};
use crate::observability::COMPOSITE_DURATION;
use crate::retry::{retry_with_policy, RetryPolicy};

/// What a read does when the recommendation or review backend fails.
/// Applies to both sub-resources alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubResourcePolicy {
    /// Fail the whole read with the sub-resource's error.
    #[default]
    Propagate,
    /// Serve the aggregate with the failed sub-resource as an empty list.
    Degrade,
}

impl FromStr for SubResourcePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "propagate" => Ok(Self::Propagate),
            "degrade" => Ok(Self::Degrade),
            other => Err(format!("unknown sub-resource policy: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompositeConfig {
    /// Reported as `serviceAddresses.compositeProduct`.
    pub service_address: String,
    pub sub_resource_policy: SubResourcePolicy,
    /// Deadline for one composite operation, all backend calls included.
    pub request_timeout: Duration,
    /// Applied to gets and deletes only.
    pub retry: RetryPolicy,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            service_address: "localhost:8080".into(),
            sub_resource_policy: SubResourcePolicy::Propagate,
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::disabled(),
        }
    }
}

/// Composes products, recommendations and reviews into one resource.
///
/// Holds no per-request state; one instance serves all requests concurrently.
///
/// Writes are not atomic across backends. If the product is created but a
/// recommendation or review create fails, nothing is rolled back: the caller
/// gets the first failure and every create that succeeded stays in place.
pub struct ProductCompositeService {
    products: Arc<dyn ProductClient>,
    recommendations: Arc<dyn RecommendationClient>,
    reviews: Arc<dyn ReviewClient>,
    cfg: CompositeConfig,
}

impl ProductCompositeService {
    pub fn new(
        products: Arc<dyn ProductClient>,
        recommendations: Arc<dyn RecommendationClient>,
        reviews: Arc<dyn ReviewClient>,
        cfg: CompositeConfig,
    ) -> Self {
        Self { products, recommendations, reviews, cfg }
    }

    pub fn config(&self) -> &CompositeConfig {
        &self.cfg
    }

    /// Read the aggregate for `product_id`.
    ///
    /// The three backend reads run concurrently and are all awaited. A failed
    /// product read wins over any sub-resource failure and is returned as-is.
    #[instrument(skip(self))]
    pub async fn get_composite(&self, product_id: i32) -> Result<ProductAggregate, ServiceError> {
        ensure_valid_product_id(product_id)?;
        self.with_deadline("read", self.fetch_composite(product_id)).await
    }

    /// Create the product, then all of its recommendations and reviews.
    #[instrument(skip(self, body), fields(product_id = body.product_id))]
    pub async fn create_composite(&self, body: &ProductAggregate) -> Result<(), ServiceError> {
        ensure_valid_product_id(body.product_id)?;
        self.with_deadline("create", self.store_composite(body)).await
    }

    /// Delete the product and everything attached to it. Deleting what is
    /// already absent succeeds.
    #[instrument(skip(self))]
    pub async fn delete_composite(&self, product_id: i32) -> Result<(), ServiceError> {
        ensure_valid_product_id(product_id)?;
        self.with_deadline("delete", self.remove_composite(product_id)).await
    }

    async fn fetch_composite(&self, product_id: i32) -> Result<ProductAggregate, ServiceError> {
        let retry = &self.cfg.retry;
        let (product, recommendations, reviews) = tokio::join!(
            retry_with_policy(retry, || self.products.get_product(product_id)),
            retry_with_policy(retry, || self.recommendations.get_recommendations(product_id)),
            retry_with_policy(retry, || self.reviews.get_reviews(product_id)),
        );

        let product = product.inspect_err(|e| {
            debug!(product_id, error = %e, kind = e.kind().as_str(), "product lookup failed");
        })?;
        if product.product_id != product_id {
            return Err(ServiceError::UnexpectedBackend {
                status: 200,
                message: format!(
                    "product backend answered productId {} for productId {}",
                    product.product_id, product_id
                ),
            });
        }
        let recommendations = self.apply_policy(Backend::Recommendation, product_id, recommendations)?;
        let reviews = self.apply_policy(Backend::Review, product_id, reviews)?;

        Ok(self.assemble(product, recommendations, reviews))
    }

    async fn store_composite(&self, body: &ProductAggregate) -> Result<(), ServiceError> {
        let product_id = body.product_id;
        debug!(product_id, "createCompositeProduct: creates a new composite entity");

        // 先创建根产品，子资源依赖其存在
        let product = Product::new(product_id, body.name.clone(), body.weight);
        self.products.create_product(&product).await?;

        let recommendation_creates = body.recommendations.iter().map(move |summary| {
            let recommendation = Recommendation::from_summary(product_id, summary);
            async move { self.recommendations.create_recommendation(&recommendation).await.map(|_| ()) }
        });
        let review_creates = body.reviews.iter().map(move |summary| {
            let review = Review::from_summary(product_id, summary);
            async move { self.reviews.create_review(&review).await.map(|_| ()) }
        });
        let (recommendation_results, review_results) =
            tokio::join!(join_all(recommendation_creates), join_all(review_creates));

        let attempted = recommendation_results.len() + review_results.len();
        let mut failures = recommendation_results
            .into_iter()
            .chain(review_results)
            .filter_map(Result::err)
            .collect::<Vec<_>>();

        if failures.is_empty() {
            debug!(product_id, created = attempted, "createCompositeProduct: composite entities created");
            return Ok(());
        }
        warn!(
            product_id,
            created = attempted - failures.len(),
            failed = failures.len(),
            "composite create partially applied; created entities are kept"
        );
        Err(failures.swap_remove(0))
    }

    async fn remove_composite(&self, product_id: i32) -> Result<(), ServiceError> {
        debug!(product_id, "deleteCompositeProduct: deletes a product aggregate");
        let retry = &self.cfg.retry;
        let (product, recommendations, reviews) = tokio::join!(
            retry_with_policy(retry, || self.products.delete_product(product_id)),
            retry_with_policy(retry, || self.recommendations.delete_recommendations(product_id)),
            retry_with_policy(retry, || self.reviews.delete_reviews(product_id)),
        );

        for (backend, result) in [
            (Backend::Product, product),
            (Backend::Recommendation, recommendations),
            (Backend::Review, reviews),
        ] {
            match result {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    debug!(%backend, product_id, "nothing to delete");
                }
                Err(e) => {
                    warn!(%backend, product_id, error = %e, "delete failed");
                    return Err(e);
                }
            }
        }
        info!(product_id, "composite product deleted");
        Ok(())
    }

    fn apply_policy<T>(
        &self,
        backend: Backend,
        product_id: i32,
        result: Result<Vec<T>, ServiceError>,
    ) -> Result<Vec<T>, ServiceError> {
        match result {
            Ok(items) => Ok(items),
            Err(e) => match self.cfg.sub_resource_policy {
                SubResourcePolicy::Propagate => {
                    debug!(%backend, product_id, error = %e, "sub-resource read failed; failing composite read");
                    Err(e)
                }
                SubResourcePolicy::Degrade => {
                    warn!(%backend, product_id, error = %e, "sub-resource read failed; serving it as empty");
                    Ok(Vec::new())
                }
            },
        }
    }

    fn assemble(
        &self,
        product: Product,
        recommendations: Vec<Recommendation>,
        reviews: Vec<Review>,
    ) -> ProductAggregate {
        let Product { product_id, name, weight, service_address } = product;
        let recommendations =
            owned_by(Backend::Recommendation, product_id, recommendations, |r| r.product_id);
        let reviews = owned_by(Backend::Review, product_id, reviews, |r| r.product_id);

        let service_addresses = ServiceAddresses {
            composite_product: self.cfg.service_address.clone(),
            product: service_address.unwrap_or_default(),
            recommendation: first_address(&recommendations, |r| r.service_address.as_deref()),
            review: first_address(&reviews, |r| r.service_address.as_deref()),
        };

        ProductAggregate {
            product_id,
            name,
            weight,
            recommendations: recommendations.iter().map(Recommendation::to_summary).collect(),
            reviews: reviews.iter().map(Review::to_summary).collect(),
            service_addresses,
        }
    }

    /// Run one composite operation under the configured deadline. On expiry the
    /// operation future is dropped, which cancels its in-flight backend calls.
    async fn with_deadline<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, ServiceError>>,
    ) -> Result<T, ServiceError> {
        let started = Instant::now();
        let result = match tokio::time::timeout(self.cfg.request_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(operation, timeout = ?self.cfg.request_timeout, "composite operation timed out");
                Err(ServiceError::Unavailable(format!(
                    "composite {operation} timed out after {:?}",
                    self.cfg.request_timeout
                )))
            }
        };
        COMPOSITE_DURATION
            .with_label_values(&[operation])
            .observe(started.elapsed().as_secs_f64());
        result
    }
}

fn owned_by<T>(backend: Backend, product_id: i32, items: Vec<T>, owner: impl Fn(&T) -> i32) -> Vec<T> {
    let received = items.len();
    let kept: Vec<T> = items.into_iter().filter(|item| owner(item) == product_id).collect();
    if kept.len() != received {
        warn!(
            %backend,
            product_id,
            dropped = received - kept.len(),
            "dropping entries that belong to another product"
        );
    }
    kept
}

fn first_address<T>(items: &[T], address: impl Fn(&T) -> Option<&str>) -> String {
    items.first().and_then(address).unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::mock::{MockProductClient, MockRecommendationClient, MockReviewClient, Op};
    use async_trait::async_trait;
    use models::{RecommendationSummary, ReviewSummary};

    struct Fixture {
        products: Arc<MockProductClient>,
        recommendations: Arc<MockRecommendationClient>,
        reviews: Arc<MockReviewClient>,
        service: ProductCompositeService,
    }

    impl Fixture {
        fn total_calls(&self) -> usize {
            self.products.total_calls() + self.recommendations.total_calls() + self.reviews.total_calls()
        }
    }

    fn fixture_with(cfg: CompositeConfig) -> Fixture {
        let products = Arc::new(MockProductClient::new("product:7001"));
        let recommendations = Arc::new(MockRecommendationClient::new("recommendation:7002"));
        let reviews = Arc::new(MockReviewClient::new("review:7003"));
        let service = ProductCompositeService::new(
            products.clone(),
            recommendations.clone(),
            reviews.clone(),
            cfg,
        );
        Fixture { products, recommendations, reviews, service }
    }

    fn fixture() -> Fixture {
        fixture_with(CompositeConfig { service_address: "composite:8080".into(), ..Default::default() })
    }

    fn aggregate(product_id: i32, recommendations: i32, reviews: i32) -> ProductAggregate {
        ProductAggregate {
            product_id,
            name: format!("name {product_id}"),
            weight: product_id,
            recommendations: (1..=recommendations)
                .map(|i| RecommendationSummary {
                    recommendation_id: i,
                    author: format!("a{i}"),
                    rate: i,
                    content: format!("c{i}"),
                })
                .collect(),
            reviews: (1..=reviews)
                .map(|i| ReviewSummary {
                    review_id: i,
                    author: format!("a{i}"),
                    subject: format!("s{i}"),
                    content: format!("c{i}"),
                })
                .collect(),
            service_addresses: ServiceAddresses::default(),
        }
    }

    #[tokio::test]
    async fn read_assembles_root_and_ordered_sub_resources() {
        let fx = fixture();
        fx.products.insert(Product::new(1, "widget", 42));
        for id in [3, 1, 2] {
            fx.recommendations.insert(Recommendation {
                product_id: 1,
                recommendation_id: id,
                author: format!("a{id}"),
                rate: id,
                content: format!("c{id}"),
                service_address: None,
            });
        }
        fx.reviews.insert(Review {
            product_id: 1,
            review_id: 9,
            author: "a".into(),
            subject: "s".into(),
            content: "c".into(),
            service_address: None,
        });

        let agg = fx.service.get_composite(1).await.unwrap();
        assert_eq!((agg.product_id, agg.name.as_str(), agg.weight), (1, "widget", 42));
        let ids: Vec<i32> = agg.recommendations.iter().map(|r| r.recommendation_id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert_eq!(agg.reviews.len(), 1);
        assert_eq!(
            agg.service_addresses,
            ServiceAddresses {
                composite_product: "composite:8080".into(),
                product: "product:7001".into(),
                recommendation: "recommendation:7002".into(),
                review: "review:7003".into(),
            }
        );
    }

    #[tokio::test]
    async fn read_missing_root_is_not_found() {
        let fx = fixture();
        let err = fx.service.get_composite(13).await.unwrap_err();
        assert_eq!(err, ServiceError::NotFound("No product found for productId: 13".into()));
    }

    #[tokio::test]
    async fn read_invalid_id_makes_no_backend_calls() {
        let fx = fixture();
        let err = fx.service.get_composite(-1).await.unwrap_err();
        assert_eq!(err, ServiceError::InvalidInput("Invalid productId: -1".into()));
        assert_eq!(fx.total_calls(), 0);
    }

    #[tokio::test]
    async fn read_without_recommendations_yields_empty_list() {
        let fx = fixture();
        fx.products.insert(Product::new(113, "no recs", 1));
        let agg = fx.service.get_composite(113).await.unwrap();
        assert!(agg.recommendations.is_empty());
        assert!(agg.reviews.is_empty());
        assert_eq!(agg.service_addresses.recommendation, "");
        assert_eq!(agg.service_addresses.review, "");
        assert_eq!(agg.service_addresses.product, "product:7001");
    }

    #[tokio::test]
    async fn read_propagates_unavailable_root_as_is() {
        let fx = fixture();
        fx.products.insert(Product::new(1, "n", 1));
        fx.products.fail_always(Op::Get, ServiceError::Unavailable("product down".into()));
        let err = fx.service.get_composite(1).await.unwrap_err();
        assert_eq!(err, ServiceError::Unavailable("product down".into()));
    }

    #[tokio::test]
    async fn root_failure_takes_precedence_over_sub_resource_failure() {
        let fx = fixture();
        fx.reviews.fail_always(Op::Get, ServiceError::Unavailable("review down".into()));
        let err = fx.service.get_composite(5).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn propagate_policy_fails_read_for_either_sub_resource() {
        let fx = fixture();
        fx.products.insert(Product::new(1, "n", 1));

        fx.recommendations.fail_next(Op::Get, ServiceError::Unavailable("rec down".into()));
        let err = fx.service.get_composite(1).await.unwrap_err();
        assert_eq!(err, ServiceError::Unavailable("rec down".into()));

        let boom = ServiceError::UnexpectedBackend { status: 500, message: "boom".into() };
        fx.reviews.fail_next(Op::Get, boom.clone());
        assert_eq!(fx.service.get_composite(1).await.unwrap_err(), boom);

        assert!(fx.service.get_composite(1).await.is_ok());
    }

    #[tokio::test]
    async fn degrade_policy_serves_failed_sub_resource_as_empty() {
        let fx = fixture_with(CompositeConfig {
            sub_resource_policy: SubResourcePolicy::Degrade,
            ..Default::default()
        });
        fx.service.create_composite(&aggregate(1, 2, 2)).await.unwrap();
        fx.recommendations.fail_always(Op::Get, ServiceError::Unavailable("rec down".into()));

        let agg = fx.service.get_composite(1).await.unwrap();
        assert!(agg.recommendations.is_empty());
        assert_eq!(agg.service_addresses.recommendation, "");
        assert_eq!(agg.reviews.len(), 2);

        fx.reviews.fail_always(Op::Get, ServiceError::Unavailable("review down".into()));
        let agg = fx.service.get_composite(1).await.unwrap();
        assert!(agg.reviews.is_empty());
    }

    struct ForeignRecommendations;

    #[async_trait]
    impl RecommendationClient for ForeignRecommendations {
        async fn get_recommendations(&self, product_id: i32) -> Result<Vec<Recommendation>, ServiceError> {
            Ok([product_id, product_id + 1]
                .into_iter()
                .map(|pid| Recommendation {
                    product_id: pid,
                    recommendation_id: pid,
                    author: "a".into(),
                    rate: 1,
                    content: "c".into(),
                    service_address: Some("rec".into()),
                })
                .collect())
        }

        async fn create_recommendation(&self, body: &Recommendation) -> Result<Recommendation, ServiceError> {
            Ok(body.clone())
        }

        async fn delete_recommendations(&self, _product_id: i32) -> Result<(), ServiceError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn entries_of_other_products_are_dropped() {
        let products = Arc::new(MockProductClient::new("product:7001"));
        products.insert(Product::new(4, "n", 1));
        let service = ProductCompositeService::new(
            products,
            Arc::new(ForeignRecommendations),
            Arc::new(MockReviewClient::new("review:7003")),
            CompositeConfig::default(),
        );
        let agg = service.get_composite(4).await.unwrap();
        assert_eq!(agg.recommendations.len(), 1);
        assert_eq!(agg.recommendations[0].recommendation_id, 4);
    }

    #[tokio::test]
    async fn create_writes_product_then_sub_resources() {
        let fx = fixture();
        fx.service.create_composite(&aggregate(1, 3, 2)).await.unwrap();
        assert!(fx.products.contains(1));
        assert_eq!(fx.recommendations.count_for(1), 3);
        assert_eq!(fx.reviews.count_for(1), 2);

        let agg = fx.service.get_composite(1).await.unwrap();
        let expected = aggregate(1, 3, 2);
        assert_eq!(agg.recommendations, expected.recommendations);
        assert_eq!(agg.reviews, expected.reviews);
    }

    #[tokio::test]
    async fn failed_product_create_skips_sub_resources() {
        let fx = fixture();
        fx.products.insert(Product::new(1, "existing", 1));
        let err = fx.service.create_composite(&aggregate(1, 2, 2)).await.unwrap_err();
        assert_eq!(err, ServiceError::InvalidInput("Duplicate key, Product Id: 1".into()));
        assert_eq!(fx.recommendations.calls(Op::Create), 0);
        assert_eq!(fx.reviews.calls(Op::Create), 0);
    }

    #[tokio::test]
    async fn create_is_not_atomic_across_backends() {
        let fx = fixture();
        fx.reviews.insert(Review {
            product_id: 1,
            review_id: 2,
            author: "earlier".into(),
            subject: "s".into(),
            content: "c".into(),
            service_address: None,
        });

        let err = fx.service.create_composite(&aggregate(1, 2, 3)).await.unwrap_err();
        assert_eq!(
            err,
            ServiceError::InvalidInput("Duplicate key, Product Id: 1, Review Id: 2".into())
        );
        // every launched create was awaited, none rolled back
        assert_eq!(fx.reviews.calls(Op::Create), 3);

        let agg = fx.service.get_composite(1).await.unwrap();
        assert_eq!(agg.recommendations.len(), 2);
        let ids: Vec<i32> = agg.reviews.iter().map(|r| r.review_id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
        assert_eq!(agg.reviews[0].author, "earlier");
    }

    #[tokio::test]
    async fn create_reports_first_failure_in_payload_order() {
        let fx = fixture();
        fx.recommendations.fail_always(Op::Create, ServiceError::Unavailable("rec down".into()));
        fx.reviews.fail_always(Op::Create, ServiceError::InvalidInput("bad review".into()));
        let err = fx.service.create_composite(&aggregate(2, 1, 1)).await.unwrap_err();
        assert_eq!(err, ServiceError::Unavailable("rec down".into()));
        assert!(fx.products.contains(2));
    }

    #[tokio::test]
    async fn create_invalid_id_makes_no_backend_calls() {
        let fx = fixture();
        let err = fx.service.create_composite(&aggregate(0, 1, 1)).await.unwrap_err();
        assert_eq!(err, ServiceError::InvalidInput("Invalid productId: 0".into()));
        assert_eq!(fx.total_calls(), 0);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let fx = fixture();
        fx.service.create_composite(&aggregate(1, 1, 1)).await.unwrap();
        fx.service.delete_composite(1).await.unwrap();
        fx.service.delete_composite(1).await.unwrap();
        fx.service.delete_composite(99).await.unwrap();
        assert!(!fx.products.contains(1));
        assert_eq!(fx.recommendations.count_for(1), 0);
        assert_eq!(fx.reviews.count_for(1), 0);
    }

    #[tokio::test]
    async fn delete_surfaces_failures_other_than_absence() {
        let fx = fixture();
        fx.service.create_composite(&aggregate(1, 1, 1)).await.unwrap();
        fx.reviews.fail_next(Op::Delete, ServiceError::Unavailable("review down".into()));
        let err = fx.service.delete_composite(1).await.unwrap_err();
        assert_eq!(err, ServiceError::Unavailable("review down".into()));
        // sibling deletes still ran
        assert!(!fx.products.contains(1));
        assert_eq!(fx.recommendations.count_for(1), 0);
        assert_eq!(fx.reviews.count_for(1), 1);
    }

    #[tokio::test]
    async fn retry_recovers_unavailable_reads() {
        let fx = fixture_with(CompositeConfig {
            retry: RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5), true),
            ..Default::default()
        });
        fx.products.insert(Product::new(1, "n", 1));
        fx.products.fail_next(Op::Get, ServiceError::Unavailable("blip".into()));
        assert!(fx.service.get_composite(1).await.is_ok());
        assert_eq!(fx.products.calls(Op::Get), 2);
    }

    #[tokio::test]
    async fn creates_are_never_retried() {
        let fx = fixture_with(CompositeConfig {
            retry: RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5), true),
            ..Default::default()
        });
        fx.products.fail_next(Op::Create, ServiceError::Unavailable("blip".into()));
        assert!(fx.service.create_composite(&aggregate(1, 0, 0)).await.is_err());
        assert_eq!(fx.products.calls(Op::Create), 1);
    }

    #[tokio::test]
    async fn deadline_expiry_is_unavailable() {
        let fx = fixture_with(CompositeConfig {
            request_timeout: Duration::from_millis(50),
            ..Default::default()
        });
        fx.products.insert(Product::new(1, "n", 1));
        fx.reviews.set_delay(Some(Duration::from_secs(5)));
        let err = fx.service.get_composite(1).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(ref m) if m.contains("timed out")));
    }

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!("Degrade".parse::<SubResourcePolicy>(), Ok(SubResourcePolicy::Degrade));
        assert_eq!(" propagate ".parse::<SubResourcePolicy>(), Ok(SubResourcePolicy::Propagate));
        assert!("ignore".parse::<SubResourcePolicy>().is_err());
    }
}
