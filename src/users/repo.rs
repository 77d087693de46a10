use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::repo_types::{
    date_to_db, to_db_timestamp, ListParams, Patch, User, UserFilter, UserPatch, UserRow,
};

const USER_COLUMNS: &str = "id, full_name, email, phone_number, bio, avatar_url, \
                            date_of_birth, location, created_at, updated_at";

/// Persistence failures, already classified for the service layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated")]
    UniqueViolation { constraint: Option<String> },
    #[error("row not found")]
    NotFound,
    #[error("corrupt row: {0}")]
    CorruptRow(#[from] uuid::Error),
    #[error(transparent)]
    Backend(sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoreErrorKind {
    UniqueViolation,
}

/// Postgres SQLSTATE codes the service cares about. Anything else is opaque.
const PG_ERROR_CODES: &[(&str, StoreErrorKind)] = &[("23505", StoreErrorKind::UniqueViolation)];

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db) => {
                let kind = db.code().and_then(|code| {
                    PG_ERROR_CODES
                        .iter()
                        .find(|(known, _)| *known == code.as_ref())
                        .map(|(_, kind)| *kind)
                });
                match kind {
                    Some(StoreErrorKind::UniqueViolation) => StoreError::UniqueViolation {
                        constraint: db.constraint().map(str::to_string),
                    },
                    None => StoreError::Backend(sqlx::Error::Database(db)),
                }
            }
            other => StoreError::Backend(other),
        }
    }
}

/// Query interface over the `users` table.
///
/// Implementations must enforce email uniqueness themselves (the service
/// never checks before writing) and must report a missing row on
/// `update`/`delete` as [`StoreError::NotFound`].
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn insert(&self, user: &User) -> Result<User, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn list(&self, params: &ListParams) -> Result<Vec<User>, StoreError>;
    async fn count(&self, filter: &UserFilter) -> Result<u64, StoreError>;
    async fn update(
        &self,
        id: Uuid,
        patch: &UserPatch,
        updated_at: OffsetDateTime,
    ) -> Result<User, StoreError>;
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
    async fn exists(&self, id: Uuid) -> Result<bool, StoreError>;
}

#[derive(Clone)]
pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// Escape LIKE wildcards so user text matches literally.
fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    let mut keyword = " WHERE ";
    if let Some(search) = &filter.search {
        let pattern = like_pattern(search);
        qb.push(keyword)
            .push("(full_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR email ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR bio ILIKE ")
            .push_bind(pattern)
            .push(")");
        keyword = " AND ";
    }
    if let Some(location) = &filter.location {
        qb.push(keyword)
            .push("location ILIKE ")
            .push_bind(like_pattern(location));
    }
}

fn rows_to_users(rows: Vec<UserRow>) -> Result<Vec<User>, StoreError> {
    rows.into_iter()
        .map(|r| User::try_from(r).map_err(StoreError::from))
        .collect()
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn insert(&self, user: &User) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (id, full_name, email, phone_number, bio, avatar_url,
                               date_of_birth, location, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id.to_string())
        .bind(&user.full_name)
        .bind(&user.email)
        .bind(&user.phone_number)
        .bind(&user.bio)
        .bind(&user.avatar_url)
        .bind(user.date_of_birth.map(date_to_db))
        .bind(&user.location)
        .bind(to_db_timestamp(user.created_at))
        .bind(to_db_timestamp(user.updated_at))
        .fetch_one(&self.db)
        .await?;
        Ok(User::try_from(row)?)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(User::try_from).transpose()?)
    }

    async fn list(&self, params: &ListParams) -> Result<Vec<User>, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM users"));
        push_filter(&mut qb, &params.filter);
        // column and direction come from closed enums, never from user text
        qb.push(format!(
            " ORDER BY {col} {dir}, id {dir}",
            col = params.sort_by.column(),
            dir = params.sort_order.keyword()
        ));
        qb.push(" LIMIT ")
            .push_bind(i64::from(params.limit))
            .push(" OFFSET ")
            .push_bind(params.offset());

        let rows = qb.build_query_as::<UserRow>().fetch_all(&self.db).await?;
        rows_to_users(rows)
    }

    async fn count(&self, filter: &UserFilter) -> Result<u64, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
        push_filter(&mut qb, filter);
        let (total,) = qb.build_query_as::<(i64,)>().fetch_one(&self.db).await?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    async fn update(
        &self,
        id: Uuid,
        patch: &UserPatch,
        updated_at: OffsetDateTime,
    ) -> Result<User, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE users SET updated_at = ");
        qb.push_bind(to_db_timestamp(updated_at));

        if let Patch::Set(v) = &patch.full_name {
            qb.push(", full_name = ").push_bind(v.clone());
        }
        if let Patch::Set(v) = &patch.email {
            qb.push(", email = ").push_bind(v.clone());
        }
        if let Patch::Set(v) = &patch.phone_number {
            qb.push(", phone_number = ").push_bind(v.clone());
        }
        if let Patch::Set(v) = &patch.bio {
            qb.push(", bio = ").push_bind(v.clone());
        }
        if let Patch::Set(v) = &patch.avatar_url {
            qb.push(", avatar_url = ").push_bind(v.clone());
        }
        if let Patch::Set(v) = &patch.date_of_birth {
            qb.push(", date_of_birth = ").push_bind(v.map(date_to_db));
        }
        if let Patch::Set(v) = &patch.location {
            qb.push(", location = ").push_bind(v.clone());
        }

        qb.push(" WHERE id = ")
            .push_bind(id.to_string())
            .push(format!(" RETURNING {USER_COLUMNS}"));

        let row = qb
            .build_query_as::<UserRow>()
            .fetch_optional(&self.db)
            .await?
            .ok_or(StoreError::NotFound)?;
        Ok(User::try_from(row)?)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.to_string())
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn exists(&self, id: Uuid) -> Result<bool, StoreError> {
        let (found,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
                .bind(id.to_string())
                .fetch_one(&self.db)
                .await?;
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo_types::{SortField, SortOrder};

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("alice"), "%alice%");
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    #[test]
    fn filter_sql_combines_search_and_location() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
        push_filter(
            &mut qb,
            &UserFilter {
                search: Some("ada".into()),
                location: Some("london".into()),
            },
        );
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM users WHERE (full_name ILIKE $1 OR email ILIKE $2 OR bio ILIKE $3) AND location ILIKE $4"
        );
    }

    #[test]
    fn filter_sql_without_filters_has_no_where() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
        push_filter(&mut qb, &UserFilter::default());
        assert_eq!(qb.sql(), "SELECT COUNT(*) FROM users");
    }

    #[test]
    fn sort_columns_are_whitelisted() {
        assert_eq!(SortField::FullName.column(), "full_name");
        assert_eq!(SortField::UpdatedAt.column(), "updated_at");
        assert_eq!(SortOrder::Desc.keyword(), "DESC");
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        assert!(matches!(
            StoreError::from(sqlx::Error::RowNotFound),
            StoreError::NotFound
        ));
        assert!(matches!(
            StoreError::from(sqlx::Error::PoolTimedOut),
            StoreError::Backend(_)
        ));
    }
}
