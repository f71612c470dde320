use std::sync::Arc;

use service::ProductCompositeService;

/// Shared handler state; cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub composite: Arc<ProductCompositeService>,
}

impl AppState {
    pub fn new(composite: ProductCompositeService) -> Self {
        Self { composite: Arc::new(composite) }
    }
}
