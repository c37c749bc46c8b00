use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::{debug, info};

use crate::auth::AdminUser;
use crate::db::models::product::Product;
use crate::db::repositories::categories::CategoryRepository;
use crate::db::repositories::products::ProductRepository;
use crate::error::{blocking, ApiError, ApiResult};
use crate::extract::ValidJson;
use crate::filters::{ProductFilter, ProductFilterParams};
use crate::handlers::payloads::{
    ProductDetail, ProductPatch, ProductPayload, ProductResponse, ProductSearchItem, ValidProduct,
};
use crate::router::AppState;

const DUPLICATE_NAME: &str = "A product with the same name already exists.";
const UNKNOWN_CATEGORY: &str = "This category doesn't exist.";

fn not_found(product_id: i32) -> ApiError {
    ApiError::NotFound(format!("Product with ID {} not found", product_id))
}

// Handler for GET /v0/products/search
pub async fn search_products(
    State(state): State<AppState>,
    Query(params): Query<ProductFilterParams>,
) -> ApiResult<impl IntoResponse> {
    let filter = ProductFilter::from_params(&params)?;
    debug!(?filter, "Searching products");

    let repo = ProductRepository::new(state.pool.clone());
    let products = blocking(move || Ok(repo.search(&filter)?)).await?;

    let items: Vec<ProductSearchItem> = products.iter().map(ProductSearchItem::from).collect();
    Ok(Json(items))
}

// Handler for GET /v0/products/search/:product_id
pub async fn get_product_detail(
    State(state): State<AppState>,
    Path(product_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    debug!("Fetching product detail for id: {}", product_id);

    let repo = ProductRepository::new(state.pool.clone());
    let found = blocking(move || Ok(repo.find_with_category(product_id)?)).await?;

    let (product, category) = found.ok_or_else(|| not_found(product_id))?;
    Ok(Json(ProductDetail::new(&product, &category)))
}

// Handler for POST /v0/products
pub async fn create_product(
    _admin: AdminUser,
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<ProductPayload>,
) -> ApiResult<impl IntoResponse> {
    let valid = payload.validate(state.config.pricing.loss_factor)?;
    debug!(name = %valid.name, "Creating product");

    let products = ProductRepository::new(state.pool.clone());
    let categories = CategoryRepository::new(state.pool.clone());

    let (product, category) = blocking(move || {
        let category = categories
            .find(valid.category_id)?
            .ok_or_else(|| ApiError::BadRequest(UNKNOWN_CATEGORY.to_string()))?;
        if products.exists_by_name(&valid.name)? {
            return Err(ApiError::BadRequest(DUPLICATE_NAME.to_string()));
        }
        let product = products
            .create(valid.into_new())
            .map_err(|e| ApiError::from_write(e, DUPLICATE_NAME, UNKNOWN_CATEGORY))?;
        Ok((product, category))
    })
    .await?;

    info!(product_id = product.id, name = %product.name, "Product created");
    Ok((StatusCode::CREATED, Json(ProductResponse::new(&product, &category))))
}

// Handler for GET /v0/products/:product_id
pub async fn get_product(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(product_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    let repo = ProductRepository::new(state.pool.clone());
    let found = blocking(move || Ok(repo.find_with_category(product_id)?)).await?;

    let (product, category) = found.ok_or_else(|| not_found(product_id))?;
    Ok(Json(ProductResponse::new(&product, &category)))
}

// Handler for PUT /v0/products/:product_id
pub async fn replace_product(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(product_id): Path<i32>,
    ValidJson(payload): ValidJson<ProductPayload>,
) -> ApiResult<impl IntoResponse> {
    let loss_factor = state.config.pricing.loss_factor;
    let valid = payload.validate(loss_factor)?;
    let response = write_product(&state, product_id, move |_| Ok(valid)).await?;
    Ok(Json(response))
}

// Handler for PATCH /v0/products/:product_id
pub async fn patch_product(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(product_id): Path<i32>,
    ValidJson(patch): ValidJson<ProductPatch>,
) -> ApiResult<impl IntoResponse> {
    let loss_factor = state.config.pricing.loss_factor;
    let response =
        write_product(&state, product_id, move |current| patch.merge(current, loss_factor)).await?;
    Ok(Json(response))
}

/// Shared body of PUT and PATCH: loads the product, lets `prepare` produce
/// the validated target state, then writes it.
async fn write_product<F>(state: &AppState, product_id: i32, prepare: F) -> ApiResult<ProductResponse>
where
    F: FnOnce(&Product) -> ApiResult<ValidProduct> + Send + 'static,
{
    let products = ProductRepository::new(state.pool.clone());
    let categories = CategoryRepository::new(state.pool.clone());

    let (product, category) = blocking(move || {
        let current = products.find(product_id)?.ok_or_else(|| not_found(product_id))?;
        let valid = prepare(&current)?;

        let category = categories
            .find(valid.category_id)?
            .ok_or_else(|| ApiError::BadRequest(UNKNOWN_CATEGORY.to_string()))?;

        let updated = products
            .update(product_id, valid.into_changes())
            .map_err(|e| ApiError::from_write(e, DUPLICATE_NAME, UNKNOWN_CATEGORY))?
            .ok_or_else(|| not_found(product_id))?;
        Ok((updated, category))
    })
    .await?;

    info!(product_id, "Product updated");
    Ok(ProductResponse::new(&product, &category))
}

// Handler for DELETE /v0/products/:product_id
pub async fn delete_product(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(product_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    let repo = ProductRepository::new(state.pool.clone());
    let deleted = blocking(move || Ok(repo.delete(product_id)?)).await?;

    if deleted == 0 {
        return Err(not_found(product_id));
    }
    info!(product_id, "Product deleted");
    Ok(StatusCode::NO_CONTENT)
}
