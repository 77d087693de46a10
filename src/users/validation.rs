use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use time::{format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime};
use uuid::Uuid;

use crate::users::dto::{CreateUserRequest, ListUsersQuery, UpdateUserRequest};
use crate::users::repo_types::{ListParams, NewUser, Patch, SortField, SortOrder, UserFilter, UserPatch};

pub const FULL_NAME_MAX: usize = 100;
pub const BIO_MAX: usize = 500;
pub const LOCATION_MAX: usize = 100;
pub const LIMIT_MAX: u32 = 100;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref PHONE_RE: Regex = Regex::new(r"^\+?[1-9][0-9]{6,14}$").unwrap();
    static ref PHONE_SEPARATORS_RE: Regex = Regex::new(r"[\s().-]").unwrap();
    static ref HTTP_URL_RE: Regex = Regex::new(r"^https?://[^\s/$.?#][^\s]*$").unwrap();
    static ref DATA_URL_RE: Regex =
        Regex::new(r"^data:image/[A-Za-z0-9.+-]+;base64,[A-Za-z0-9+/]+=*$").unwrap();
}

/// One rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub path: String,
    pub message: String,
}

impl FieldError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Collects every violation in a single pass over the input.
#[derive(Debug, Default)]
struct Violations(Vec<FieldError>);

impl Violations {
    fn push(&mut self, path: &str, message: impl Into<String>) {
        self.0.push(FieldError::new(path, message));
    }

    fn check<T>(&mut self, path: &str, result: Result<T, String>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(message) => {
                self.push(path, message);
                None
            }
        }
    }

    fn reject_present(&mut self, path: &str, value: &Patch<Value>) {
        if value.is_set() {
            self.push(path, format!("{path} is assigned by the server and cannot be set"));
        }
    }

    fn wrong_type(&mut self, path: &str, got: &Value) {
        self.push(path, format!("Expected string, received {}", json_kind(got)));
    }

    /// A field every new user must carry. `null` counts as missing.
    fn required<T>(
        &mut self,
        path: &str,
        value: Option<Value>,
        missing: &str,
        parse: impl FnOnce(&str) -> Result<T, String>,
    ) -> Option<T> {
        match value {
            None | Some(Value::Null) => {
                self.push(path, missing);
                None
            }
            Some(Value::String(raw)) => self.check(path, parse(&raw)),
            Some(other) => {
                self.wrong_type(path, &other);
                None
            }
        }
    }

    fn optional<T>(
        &mut self,
        path: &str,
        value: Option<Value>,
        parse: impl FnOnce(&str) -> Result<Option<T>, String>,
    ) -> Option<T> {
        match value {
            None | Some(Value::Null) => None,
            Some(Value::String(raw)) => self.check(path, parse(&raw)).flatten(),
            Some(other) => {
                self.wrong_type(path, &other);
                None
            }
        }
    }

    fn required_patch<T>(
        &mut self,
        path: &str,
        patch: Patch<Value>,
        parse: impl FnOnce(&str) -> Result<T, String>,
    ) -> Patch<T> {
        match patch {
            Patch::Unset => Patch::Unset,
            Patch::Set(Value::Null) => {
                self.push(path, format!("{path} cannot be null"));
                Patch::Unset
            }
            Patch::Set(Value::String(raw)) => {
                self.check(path, parse(&raw)).map_or(Patch::Unset, Patch::Set)
            }
            Patch::Set(other) => {
                self.wrong_type(path, &other);
                Patch::Unset
            }
        }
    }

    fn optional_patch<T>(
        &mut self,
        path: &str,
        patch: Patch<Value>,
        parse: impl FnOnce(&str) -> Result<Option<T>, String>,
    ) -> Patch<Option<T>> {
        match patch {
            Patch::Unset => Patch::Unset,
            Patch::Set(Value::Null) => Patch::Set(None),
            Patch::Set(Value::String(raw)) => {
                self.check(path, parse(&raw)).map_or(Patch::Unset, Patch::Set)
            }
            Patch::Set(other) => {
                self.wrong_type(path, &other);
                Patch::Unset
            }
        }
    }

    fn into_result<T>(self, value: T) -> Result<T, Vec<FieldError>> {
        if self.0.is_empty() {
            Ok(value)
        } else {
            Err(self.0)
        }
    }
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn full_name(raw: &str) -> Result<String, String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err("Full name is required".into());
    }
    if name.chars().count() > FULL_NAME_MAX {
        return Err(format!("Full name must be at most {FULL_NAME_MAX} characters"));
    }
    Ok(name.to_string())
}

fn email(raw: &str) -> Result<String, String> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err("Email is required".into());
    }
    if !is_valid_email(&email) {
        return Err("Invalid email format".into());
    }
    Ok(email)
}

/// Trimmed text; blank means "no value".
fn non_blank(raw: &str) -> Option<&str> {
    let s = raw.trim();
    (!s.is_empty()).then_some(s)
}

fn bounded_text(raw: &str, label: &str, max: usize) -> Result<Option<String>, String> {
    match non_blank(raw) {
        None => Ok(None),
        Some(s) if s.chars().count() > max => {
            Err(format!("{label} must be at most {max} characters"))
        }
        Some(s) => Ok(Some(s.to_string())),
    }
}

fn bio(raw: &str) -> Result<Option<String>, String> {
    bounded_text(raw, "Bio", BIO_MAX)
}

fn location(raw: &str) -> Result<Option<String>, String> {
    bounded_text(raw, "Location", LOCATION_MAX)
}

fn phone_number(raw: &str) -> Result<Option<String>, String> {
    let Some(phone) = non_blank(raw) else {
        return Ok(None);
    };
    let digits = PHONE_SEPARATORS_RE.replace_all(phone, "");
    if !PHONE_RE.is_match(&digits) {
        return Err("Invalid phone number format".into());
    }
    Ok(Some(phone.to_string()))
}

fn avatar_url(raw: &str) -> Result<Option<String>, String> {
    let Some(url) = non_blank(raw) else {
        return Ok(None);
    };
    if HTTP_URL_RE.is_match(url) || DATA_URL_RE.is_match(url) {
        Ok(Some(url.to_string()))
    } else {
        Err("Avatar must be a valid URL".into())
    }
}

fn date_of_birth(raw: &str) -> Result<Option<Date>, String> {
    let Some(s) = non_blank(raw) else {
        return Ok(None);
    };
    let date = Date::parse(s, format_description!("[year]-[month]-[day]"))
        .or_else(|_| OffsetDateTime::parse(s, &Rfc3339).map(|dt| dt.date()))
        .map_err(|_| "Date of birth must be a valid date (YYYY-MM-DD)".to_string())?;
    if date > OffsetDateTime::now_utc().date() {
        return Err("Date of birth cannot be in the future".into());
    }
    Ok(Some(date))
}

pub fn validate_create(req: CreateUserRequest) -> Result<NewUser, Vec<FieldError>> {
    let mut v = Violations::default();
    v.reject_present("id", &req.id);
    v.reject_present("createdAt", &req.created_at);
    v.reject_present("updatedAt", &req.updated_at);

    let full_name = v.required("fullName", req.full_name, "Full name is required", full_name);
    let email = v.required("email", req.email, "Email is required", email);
    let phone_number = v.optional("phoneNumber", req.phone_number, phone_number);
    let bio = v.optional("bio", req.bio, bio);
    let avatar_url = v.optional("avatarUrl", req.avatar_url, avatar_url);
    let date_of_birth = v.optional("dateOfBirth", req.date_of_birth, date_of_birth);
    let location = v.optional("location", req.location, location);

    match (full_name, email) {
        (Some(full_name), Some(email)) => v.into_result(NewUser {
            full_name,
            email,
            phone_number,
            bio,
            avatar_url,
            date_of_birth,
            location,
        }),
        _ => Err(v.0),
    }
}

pub fn validate_update(req: UpdateUserRequest) -> Result<UserPatch, Vec<FieldError>> {
    let mut v = Violations::default();
    v.reject_present("id", &req.id);
    v.reject_present("createdAt", &req.created_at);
    v.reject_present("updatedAt", &req.updated_at);

    let patch = UserPatch {
        full_name: v.required_patch("fullName", req.full_name, full_name),
        email: v.required_patch("email", req.email, email),
        phone_number: v.optional_patch("phoneNumber", req.phone_number, phone_number),
        bio: v.optional_patch("bio", req.bio, bio),
        avatar_url: v.optional_patch("avatarUrl", req.avatar_url, avatar_url),
        date_of_birth: v.optional_patch("dateOfBirth", req.date_of_birth, date_of_birth),
        location: v.optional_patch("location", req.location, location),
    };

    if v.0.is_empty() && patch.is_empty() {
        v.push("body", "At least one field must be provided");
    }
    v.into_result(patch)
}

pub fn parse_user_id(raw: &str) -> Result<Uuid, Vec<FieldError>> {
    Uuid::parse_str(raw.trim()).map_err(|_| vec![FieldError::new("id", "Invalid user id")])
}

fn page_number(raw: &str) -> Result<u32, String> {
    match raw.trim().parse::<u32>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err("Page must be an integer greater than or equal to 1".into()),
    }
}

fn page_limit(raw: &str) -> Result<u32, String> {
    match raw.trim().parse::<u32>() {
        Ok(n) if (1..=LIMIT_MAX).contains(&n) => Ok(n),
        _ => Err(format!("Limit must be an integer between 1 and {LIMIT_MAX}")),
    }
}

pub fn validate_list_query(q: ListUsersQuery) -> Result<ListParams, Vec<FieldError>> {
    let mut v = Violations::default();
    let defaults = ListParams::default();

    let present = |raw: Option<String>| raw.filter(|s| !s.trim().is_empty());

    let page = present(q.page)
        .and_then(|raw| v.check("page", page_number(&raw)))
        .unwrap_or(defaults.page);
    let limit = present(q.limit)
        .and_then(|raw| v.check("limit", page_limit(&raw)))
        .unwrap_or(defaults.limit);
    let sort_by = present(q.sort_by)
        .and_then(|raw| {
            v.check(
                "sortBy",
                SortField::parse(raw.trim())
                    .ok_or_else(|| format!("Sort field must be one of: {}", SortField::ACCEPTED)),
            )
        })
        .unwrap_or(defaults.sort_by);
    let sort_order = present(q.sort_order)
        .and_then(|raw| {
            v.check(
                "sortOrder",
                SortOrder::parse(raw.trim()).ok_or_else(|| "Sort order must be 'asc' or 'desc'".to_string()),
            )
        })
        .unwrap_or(defaults.sort_order);

    let filter = UserFilter {
        search: present(q.search).map(|s| s.trim().to_string()),
        location: present(q.location).map(|s| s.trim().to_string()),
    };

    v.into_result(ListParams {
        page,
        limit,
        filter,
        sort_by,
        sort_order,
    })
}
