use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::{debug, info};

use crate::auth::AdminUser;
use crate::db::models::category::NewCategory;
use crate::db::repositories::categories::CategoryRepository;
use crate::error::{blocking, ApiError, ApiResult};
use crate::extract::ValidJson;
use crate::handlers::payloads::CategoryPayload;
use crate::router::AppState;

const DUPLICATE_NAME: &str = "A category with the same name already exists.";
const STILL_REFERENCED: &str = "This category still has products and cannot be deleted.";

fn not_found(category_id: i32) -> ApiError {
    ApiError::NotFound(format!("Category with ID {} not found", category_id))
}

// Handler for GET /v0/categories
pub async fn list_categories(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    debug!("Fetching all categories");

    let repo = CategoryRepository::new(state.pool.clone());
    let categories = blocking(move || Ok(repo.find_all()?)).await?;
    Ok(Json(categories))
}

// Handler for POST /v0/categories
pub async fn create_category(
    _admin: AdminUser,
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<CategoryPayload>,
) -> ApiResult<impl IntoResponse> {
    let name = payload.validate()?;

    let repo = CategoryRepository::new(state.pool.clone());
    let category = blocking(move || {
        if repo.find_by_name(&name)?.is_some() {
            return Err(ApiError::BadRequest(DUPLICATE_NAME.to_string()));
        }
        repo.create(NewCategory { name }).map_err(|e| match e {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                ApiError::BadRequest(DUPLICATE_NAME.to_string())
            }
            other => ApiError::Database(other),
        })
    })
    .await?;

    info!(category_id = category.id, name = %category.name, "Category created");
    Ok((StatusCode::CREATED, Json(category)))
}

// Handler for GET /v0/categories/:category_id
pub async fn get_category(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(category_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    let repo = CategoryRepository::new(state.pool.clone());
    let category = blocking(move || Ok(repo.find(category_id)?)).await?;
    category.map(Json).ok_or_else(|| not_found(category_id))
}

// Handler for DELETE /v0/categories/:category_id
pub async fn delete_category(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(category_id): Path<i32>,
) -> ApiResult<impl IntoResponse> {
    let repo = CategoryRepository::new(state.pool.clone());
    let deleted = blocking(move || {
        repo.delete(category_id)
            .map_err(|e| ApiError::from_delete(e, STILL_REFERENCED))
    })
    .await?;

    if deleted == 0 {
        return Err(not_found(category_id));
    }
    info!(category_id, "Category deleted");
    Ok(StatusCode::NO_CONTENT)
}
