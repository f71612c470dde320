//! In-memory backing clients for tests and local wiring.
//!
//! Each double behaves like its backend (duplicate keys, bulk deletes,
//! `NotFound` for an absent product), counts calls, and can be told to fail
//! or stall a given operation.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use models::{Product, Recommendation, Review};

use super::{ProductClient, RecommendationClient, ReviewClient};
use crate::errors::{ensure_valid_product_id, ServiceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Get,
    Create,
    Delete,
}

impl Op {
    fn index(self) -> usize {
        match self {
            Op::Get => 0,
            Op::Create => 1,
            Op::Delete => 2,
        }
    }
}

#[derive(Default)]
struct Faults {
    always: Mutex<HashMap<Op, ServiceError>>,
    next: Mutex<HashMap<Op, VecDeque<ServiceError>>>,
    delay: Mutex<Option<Duration>>,
    calls: [AtomicUsize; 3],
}

impl Faults {
    async fn enter(&self, op: Op) -> Result<(), ServiceError> {
        self.calls[op.index()].fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        let queued = self.next.lock().unwrap().get_mut(&op).and_then(|q| q.pop_front());
        if let Some(e) = queued {
            return Err(e);
        }
        if let Some(e) = self.always.lock().unwrap().get(&op).cloned() {
            return Err(e);
        }
        Ok(())
    }

    fn fail_always(&self, op: Op, err: ServiceError) {
        self.always.lock().unwrap().insert(op, err);
    }

    fn fail_next(&self, op: Op, err: ServiceError) {
        self.next.lock().unwrap().entry(op).or_default().push_back(err);
    }

    fn calls(&self, op: Op) -> usize {
        self.calls[op.index()].load(Ordering::SeqCst)
    }

    fn total_calls(&self) -> usize {
        self.calls.iter().map(|c| c.load(Ordering::SeqCst)).sum()
    }
}

macro_rules! fault_controls {
    ($ty:ty) => {
        impl $ty {
            /// Fail every call of `op` with `err` from now on.
            pub fn fail_always(&self, op: Op, err: ServiceError) {
                self.faults.fail_always(op, err);
            }

            /// Fail the next call of `op` with `err`; queued failures apply in order.
            pub fn fail_next(&self, op: Op, err: ServiceError) {
                self.faults.fail_next(op, err);
            }

            /// Delay every call before it is served.
            pub fn set_delay(&self, delay: Option<Duration>) {
                *self.faults.delay.lock().unwrap() = delay;
            }

            pub fn calls(&self, op: Op) -> usize {
                self.faults.calls(op)
            }

            pub fn total_calls(&self) -> usize {
                self.faults.total_calls()
            }
        }
    };
}

pub struct MockProductClient {
    address: String,
    store: Mutex<BTreeMap<i32, Product>>,
    faults: Faults,
}

fault_controls!(MockProductClient);

impl MockProductClient {
    pub fn new(address: impl Into<String>) -> Self {
        Self { address: address.into(), store: Mutex::new(BTreeMap::new()), faults: Faults::default() }
    }

    /// Seed a product without going through the client contract.
    pub fn insert(&self, product: Product) {
        self.store.lock().unwrap().insert(product.product_id, product);
    }

    pub fn contains(&self, product_id: i32) -> bool {
        self.store.lock().unwrap().contains_key(&product_id)
    }

    fn served(&self, p: &Product) -> Product {
        Product { service_address: Some(self.address.clone()), ..p.clone() }
    }
}

#[async_trait]
impl ProductClient for MockProductClient {
    async fn get_product(&self, product_id: i32) -> Result<Product, ServiceError> {
        self.faults.enter(Op::Get).await?;
        ensure_valid_product_id(product_id)?;
        let store = self.store.lock().unwrap();
        store
            .get(&product_id)
            .map(|p| self.served(p))
            .ok_or_else(|| ServiceError::NotFound(format!("No product found for productId: {product_id}")))
    }

    async fn create_product(&self, body: &Product) -> Result<Product, ServiceError> {
        self.faults.enter(Op::Create).await?;
        ensure_valid_product_id(body.product_id)?;
        let mut store = self.store.lock().unwrap();
        if store.contains_key(&body.product_id) {
            return Err(ServiceError::InvalidInput(format!(
                "Duplicate key, Product Id: {}",
                body.product_id
            )));
        }
        let stored = Product { service_address: None, ..body.clone() };
        store.insert(body.product_id, stored.clone());
        Ok(self.served(&stored))
    }

    async fn delete_product(&self, product_id: i32) -> Result<(), ServiceError> {
        self.faults.enter(Op::Delete).await?;
        ensure_valid_product_id(product_id)?;
        match self.store.lock().unwrap().remove(&product_id) {
            Some(_) => Ok(()),
            None => Err(ServiceError::NotFound(format!("No product found for productId: {product_id}"))),
        }
    }
}

pub struct MockRecommendationClient {
    address: String,
    store: Mutex<Vec<Recommendation>>,
    faults: Faults,
}

fault_controls!(MockRecommendationClient);

impl MockRecommendationClient {
    pub fn new(address: impl Into<String>) -> Self {
        Self { address: address.into(), store: Mutex::new(Vec::new()), faults: Faults::default() }
    }

    pub fn insert(&self, recommendation: Recommendation) {
        self.store.lock().unwrap().push(recommendation);
    }

    pub fn count_for(&self, product_id: i32) -> usize {
        self.store.lock().unwrap().iter().filter(|r| r.product_id == product_id).count()
    }
}

#[async_trait]
impl RecommendationClient for MockRecommendationClient {
    async fn get_recommendations(&self, product_id: i32) -> Result<Vec<Recommendation>, ServiceError> {
        self.faults.enter(Op::Get).await?;
        ensure_valid_product_id(product_id)?;
        let store = self.store.lock().unwrap();
        Ok(store
            .iter()
            .filter(|r| r.product_id == product_id)
            .map(|r| Recommendation { service_address: Some(self.address.clone()), ..r.clone() })
            .collect())
    }

    async fn create_recommendation(&self, body: &Recommendation) -> Result<Recommendation, ServiceError> {
        self.faults.enter(Op::Create).await?;
        ensure_valid_product_id(body.product_id)?;
        let mut store = self.store.lock().unwrap();
        if store
            .iter()
            .any(|r| r.product_id == body.product_id && r.recommendation_id == body.recommendation_id)
        {
            return Err(ServiceError::InvalidInput(format!(
                "Duplicate key, Product Id: {}, Recommendation Id: {}",
                body.product_id, body.recommendation_id
            )));
        }
        store.push(Recommendation { service_address: None, ..body.clone() });
        Ok(Recommendation { service_address: Some(self.address.clone()), ..body.clone() })
    }

    async fn delete_recommendations(&self, product_id: i32) -> Result<(), ServiceError> {
        self.faults.enter(Op::Delete).await?;
        ensure_valid_product_id(product_id)?;
        self.store.lock().unwrap().retain(|r| r.product_id != product_id);
        Ok(())
    }
}

pub struct MockReviewClient {
    address: String,
    store: Mutex<Vec<Review>>,
    faults: Faults,
}

fault_controls!(MockReviewClient);

impl MockReviewClient {
    pub fn new(address: impl Into<String>) -> Self {
        Self { address: address.into(), store: Mutex::new(Vec::new()), faults: Faults::default() }
    }

    pub fn insert(&self, review: Review) {
        self.store.lock().unwrap().push(review);
    }

    pub fn count_for(&self, product_id: i32) -> usize {
        self.store.lock().unwrap().iter().filter(|r| r.product_id == product_id).count()
    }
}

#[async_trait]
impl ReviewClient for MockReviewClient {
    async fn get_reviews(&self, product_id: i32) -> Result<Vec<Review>, ServiceError> {
        self.faults.enter(Op::Get).await?;
        ensure_valid_product_id(product_id)?;
        let store = self.store.lock().unwrap();
        Ok(store
            .iter()
            .filter(|r| r.product_id == product_id)
            .map(|r| Review { service_address: Some(self.address.clone()), ..r.clone() })
            .collect())
    }

    async fn create_review(&self, body: &Review) -> Result<Review, ServiceError> {
        self.faults.enter(Op::Create).await?;
        ensure_valid_product_id(body.product_id)?;
        let mut store = self.store.lock().unwrap();
        if store.iter().any(|r| r.product_id == body.product_id && r.review_id == body.review_id) {
            return Err(ServiceError::InvalidInput(format!(
                "Duplicate key, Product Id: {}, Review Id: {}",
                body.product_id, body.review_id
            )));
        }
        store.push(Review { service_address: None, ..body.clone() });
        Ok(Review { service_address: Some(self.address.clone()), ..body.clone() })
    }

    async fn delete_reviews(&self, product_id: i32) -> Result<(), ServiceError> {
        self.faults.enter(Op::Delete).await?;
        ensure_valid_product_id(product_id)?;
        self.store.lock().unwrap().retain(|r| r.product_id != product_id);
        Ok(())
    }
}
