use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        OriginalUri, Path, State,
    },
    http::StatusCode,
    Json,
};
use models::ProductAggregate;
use tracing::debug;

use crate::errors::JsonApiError;
use crate::state::AppState;

fn product_id(id: Result<Path<i32>, PathRejection>, path: &str) -> Result<i32, JsonApiError> {
    id.map(|Path(id)| id).map_err(|rejection| {
        debug!(%rejection, path, "malformed productId");
        JsonApiError::type_mismatch(path)
    })
}

/// 读取组合产品视图
pub async fn get_composite(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    id: Result<Path<i32>, PathRejection>,
) -> Result<Json<ProductAggregate>, JsonApiError> {
    let path = uri.path();
    let product_id = product_id(id, path)?;
    state
        .composite
        .get_composite(product_id)
        .await
        .map(Json)
        .map_err(|e| JsonApiError::from_service(e, path))
}

/// 创建组合产品（产品 + 推荐 + 评论）
pub async fn create_composite(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    payload: Result<Json<ProductAggregate>, JsonRejection>,
) -> Result<StatusCode, JsonApiError> {
    let path = uri.path();
    let Json(body) = payload
        .map_err(|rejection| JsonApiError::new(StatusCode::BAD_REQUEST, rejection.body_text(), path))?;
    state
        .composite
        .create_composite(&body)
        .await
        .map(|()| StatusCode::OK)
        .map_err(|e| JsonApiError::from_service(e, path))
}

/// 删除组合产品；不存在时同样返回成功
pub async fn delete_composite(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    id: Result<Path<i32>, PathRejection>,
) -> Result<StatusCode, JsonApiError> {
    let path = uri.path();
    let product_id = product_id(id, path)?;
    state
        .composite
        .delete_composite(product_id)
        .await
        .map(|()| StatusCode::OK)
        .map_err(|e| JsonApiError::from_service(e, path))
}
