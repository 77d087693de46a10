use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::users::repo_types::Patch;

/// Body of `POST /users`. Fields stay raw JSON so that missing or mistyped
/// values surface as field errors instead of a generic parse failure.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub full_name: Option<Value>,
    pub email: Option<Value>,
    pub phone_number: Option<Value>,
    pub bio: Option<Value>,
    pub avatar_url: Option<Value>,
    pub date_of_birth: Option<Value>,
    pub location: Option<Value>,
    // server-assigned, rejected when present
    #[serde(default)]
    pub id: Patch<Value>,
    #[serde(default)]
    pub created_at: Patch<Value>,
    #[serde(default)]
    pub updated_at: Patch<Value>,
}

/// Body of `PUT /users/:id`. A missing key leaves the column untouched, an
/// explicit `null` or empty string clears an optional column.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub full_name: Patch<Value>,
    #[serde(default)]
    pub email: Patch<Value>,
    #[serde(default)]
    pub phone_number: Patch<Value>,
    #[serde(default)]
    pub bio: Patch<Value>,
    #[serde(default)]
    pub avatar_url: Patch<Value>,
    #[serde(default)]
    pub date_of_birth: Patch<Value>,
    #[serde(default)]
    pub location: Patch<Value>,
    #[serde(default)]
    pub id: Patch<Value>,
    #[serde(default)]
    pub created_at: Patch<Value>,
    #[serde(default)]
    pub updated_at: Patch<Value>,
}

/// Raw query string of `GET /users`; parsed and range-checked by validation.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
    pub location: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl Pagination {
    pub fn new(total: u64, page: u32, limit: u32) -> Self {
        let total_pages = total.div_ceil(u64::from(limit.max(1)));
        Self {
            total,
            page,
            limit,
            total_pages,
            has_next: u64::from(page) < total_pages,
            has_previous: page > 1,
        }
    }
}
