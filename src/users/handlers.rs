use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    response::{ApiError, ApiResponse},
    state::AppState,
    users::{
        dto::{CreateUserRequest, ListUsersQuery, Pagination, UpdateUserRequest},
        repo_types::User,
        validation::{parse_user_id, validate_create, validate_list_query, validate_update},
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user)
                .head(user_exists)
                .put(update_user)
                .delete(delete_user),
        )
}

#[instrument(skip(state, query))]
pub async fn list_users(
    State(state): State<AppState>,
    query: Result<Query<ListUsersQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<User>, Pagination>>, ApiError> {
    let Query(query) = query?;
    let params = validate_list_query(query).map_err(|errors| {
        warn!(?errors, "invalid list query");
        ApiError::from(errors)
    })?;
    let page = state.users.get_users(&params).await?;
    Ok(Json(ApiResponse::paginated(
        "Users retrieved successfully",
        page.users,
        page.pagination,
    )))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let id = parse_user_id(&id)?;
    let user = state.users.get_user_by_id(id).await?;
    Ok(Json(ApiResponse::success("User retrieved successfully", user)))
}

#[instrument(skip(state))]
pub async fn user_exists(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_user_id(&id)?;
    if state.users.user_exists(id).await? {
        Ok(StatusCode::OK)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, HeaderMap, Json<ApiResponse<User>>), ApiError> {
    let Json(payload) = payload?;
    let new_user = validate_create(payload).map_err(|errors| {
        warn!(?errors, "invalid create body");
        ApiError::from(errors)
    })?;
    let user = state.users.create_user(new_user).await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/api/users/{}", user.id)) {
        headers.insert(header::LOCATION, location);
    }

    info!(user_id = %user.id, "create_user ok");
    Ok((
        StatusCode::CREATED,
        headers,
        Json(ApiResponse::success("User created successfully", user)),
    ))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let id = parse_user_id(&id)?;
    let Json(payload) = payload?;
    let patch = validate_update(payload).map_err(|errors| {
        warn!(?errors, %id, "invalid update body");
        ApiError::from(errors)
    })?;
    let user = state.users.update_user(id, patch).await?;
    Ok(Json(ApiResponse::success("User updated successfully", user)))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let id = parse_user_id(&id)?;
    state.users.delete_user(id).await?;
    Ok(Json(ApiResponse::success("User deleted successfully", ())))
}
