use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};
use uuid::Uuid;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// User profile as the rest of the service sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(with = "iso_date::option")]
    pub date_of_birth: Option<Date>,
    pub location: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Raw `users` row. Ids are TEXT and timestamps are zone-less TIMESTAMP(3).
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub date_of_birth: Option<PrimitiveDateTime>,
    pub location: Option<String>,
    pub created_at: PrimitiveDateTime,
    pub updated_at: PrimitiveDateTime,
}

impl TryFrom<UserRow> for User {
    type Error = uuid::Error;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&r.id)?,
            full_name: r.full_name,
            email: r.email,
            phone_number: r.phone_number,
            bio: r.bio,
            avatar_url: r.avatar_url,
            date_of_birth: r.date_of_birth.map(|d| d.date()),
            location: r.location,
            created_at: r.created_at.assume_utc(),
            updated_at: r.updated_at.assume_utc(),
        })
    }
}

/// Validated input for a new user; the server fills in id and timestamps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub date_of_birth: Option<Date>,
    pub location: Option<String>,
}

impl NewUser {
    pub fn into_user(self, id: Uuid, now: OffsetDateTime) -> User {
        User {
            id,
            full_name: self.full_name,
            email: self.email,
            phone_number: self.phone_number,
            bio: self.bio,
            avatar_url: self.avatar_url,
            date_of_birth: self.date_of_birth,
            location: self.location,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A single field of a partial update: either left alone or replaced.
///
/// Nullable columns use `Patch<Option<T>>`, so `Set(None)` clears the value
/// while `Unset` keeps whatever is stored. On the wire a missing key is
/// `Unset` (via `#[serde(default)]`) and an explicit `null` is `Set(None)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch<T> {
    Unset,
    Set(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Unset
    }
}

impl<T> Patch<T> {
    pub fn is_set(&self) -> bool {
        matches!(self, Patch::Set(_))
    }

    pub fn as_set(&self) -> Option<&T> {
        match self {
            Patch::Set(v) => Some(v),
            Patch::Unset => None,
        }
    }

    /// Overwrite `slot` when the field was supplied.
    pub fn apply_to(self, slot: &mut T) {
        if let Patch::Set(v) = self {
            *slot = v;
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        T::deserialize(deserializer).map(Patch::Set)
    }
}

/// Validated partial update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub full_name: Patch<String>,
    pub email: Patch<String>,
    pub phone_number: Patch<Option<String>>,
    pub bio: Patch<Option<String>>,
    pub avatar_url: Patch<Option<String>>,
    pub date_of_birth: Patch<Option<Date>>,
    pub location: Patch<Option<String>>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        !(self.full_name.is_set()
            || self.email.is_set()
            || self.phone_number.is_set()
            || self.bio.is_set()
            || self.avatar_url.is_set()
            || self.date_of_birth.is_set()
            || self.location.is_set())
    }

    pub fn apply(self, user: &mut User, now: OffsetDateTime) {
        self.full_name.apply_to(&mut user.full_name);
        self.email.apply_to(&mut user.email);
        self.phone_number.apply_to(&mut user.phone_number);
        self.bio.apply_to(&mut user.bio);
        self.avatar_url.apply_to(&mut user.avatar_url);
        self.date_of_birth.apply_to(&mut user.date_of_birth);
        self.location.apply_to(&mut user.location);
        user.updated_at = now;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    FullName,
    Email,
    CreatedAt,
    UpdatedAt,
}

impl SortField {
    pub const ACCEPTED: &'static str = "fullName, email, createdAt, updatedAt";

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "fullName" => Some(SortField::FullName),
            "email" => Some(SortField::Email),
            "createdAt" => Some(SortField::CreatedAt),
            "updatedAt" => Some(SortField::UpdatedAt),
            _ => None,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            SortField::FullName => "full_name",
            SortField::Email => "email",
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Row filter shared by the page fetch and the count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    /// Substring of full name, email or bio.
    pub search: Option<String>,
    /// Substring of location.
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListParams {
    pub page: u32,
    pub limit: u32,
    pub filter: UserFilter,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            filter: UserFilter::default(),
            sort_by: SortField::CreatedAt,
            sort_order: SortOrder::Desc,
        }
    }
}

impl ListParams {
    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1) * i64::from(self.limit)
    }
}

/// Current UTC time truncated to the millisecond precision of TIMESTAMP(3).
pub fn now_millis() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(now.nanosecond() / 1_000_000 * 1_000_000)
        .unwrap_or(now)
}

pub fn to_db_timestamp(at: OffsetDateTime) -> PrimitiveDateTime {
    let utc = at.to_offset(time::UtcOffset::UTC);
    PrimitiveDateTime::new(utc.date(), utc.time())
}

pub fn date_to_db(date: Date) -> PrimitiveDateTime {
    PrimitiveDateTime::new(date, Time::MIDNIGHT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn row_converts_to_user() {
        let id = Uuid::new_v4();
        let row = UserRow {
            id: id.to_string(),
            full_name: "Ada Lovelace".into(),
            email: "ada@example.com".into(),
            phone_number: None,
            bio: Some("math".into()),
            avatar_url: None,
            date_of_birth: Some(datetime!(1815-12-10 0:00)),
            location: None,
            created_at: datetime!(2024-01-01 10:00:00.123),
            updated_at: datetime!(2024-01-02 10:00:00),
        };
        let user = User::try_from(row).expect("valid row");
        assert_eq!(user.id, id);
        assert_eq!(user.date_of_birth, Some(date!(1815 - 12 - 10)));
        assert_eq!(user.created_at, datetime!(2024-01-01 10:00:00.123 UTC));
    }

    #[test]
    fn row_with_malformed_id_is_rejected() {
        let row = UserRow {
            id: "not-a-uuid".into(),
            full_name: "x".into(),
            email: "x@example.com".into(),
            phone_number: None,
            bio: None,
            avatar_url: None,
            date_of_birth: None,
            location: None,
            created_at: datetime!(2024-01-01 0:00),
            updated_at: datetime!(2024-01-01 0:00),
        };
        assert!(User::try_from(row).is_err());
    }

    #[test]
    fn user_serializes_camel_case_with_plain_date() {
        let user = NewUser {
            full_name: "Ada".into(),
            email: "ada@example.com".into(),
            date_of_birth: Some(date!(1815 - 12 - 10)),
            ..NewUser::default()
        }
        .into_user(Uuid::nil(), datetime!(2024-05-01 12:00 UTC));
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["fullName"], "Ada");
        assert_eq!(json["dateOfBirth"], "1815-12-10");
        assert_eq!(json["createdAt"], "2024-05-01T12:00:00Z");
        assert!(json["phoneNumber"].is_null());
    }

    #[test]
    fn patch_distinguishes_missing_from_null() {
        #[derive(Deserialize)]
        struct Body {
            #[serde(default)]
            bio: Patch<Option<String>>,
            #[serde(default)]
            location: Patch<Option<String>>,
        }
        let body: Body = serde_json::from_str(r#"{"bio": null}"#).unwrap();
        assert_eq!(body.bio, Patch::Set(None));
        assert_eq!(body.location, Patch::Unset);
    }

    #[test]
    fn offset_follows_page_and_limit() {
        let params = ListParams { page: 3, limit: 25, ..ListParams::default() };
        assert_eq!(params.offset(), 50);
        assert_eq!(ListParams::default().offset(), 0);
    }

    #[test]
    fn now_is_millisecond_precise() {
        assert_eq!(now_millis().nanosecond() % 1_000_000, 0);
    }
}
