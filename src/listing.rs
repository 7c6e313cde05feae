/*!
 * Listing Helper
 * Query-string driven filtering, sorting and pagination shared by every
 * list endpoint.
 *
 * Sort columns come from the schema's allowlist and the direction from a
 * two-variant enum, so the only text interpolated into SQL is static.
 * Filter values and LIMIT/OFFSET are always bound parameters.
 */
use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{Arguments, FromRow, PgPool};

use crate::error::ApiError;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 10;
pub const DEFAULT_SORT_COLUMN: &str = "id";

// ============================================================================
// Schemas
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Int,
    Bool,
    Date,
    Text,
}

#[derive(Debug, Clone, Copy)]
pub struct ExactField {
    pub name: &'static str,
    pub kind: FieldKind,
}

const fn exact(name: &'static str, kind: FieldKind) -> ExactField {
    ExactField { name, kind }
}

/// Everything the generic list/detail queries need to know about a table.
#[derive(Debug)]
pub struct ResourceSchema {
    pub table: &'static str,
    pub columns: &'static str,
    pub exact_fields: &'static [ExactField],
    pub text_fields: &'static [&'static str],
    pub sortable: &'static [&'static str],
}

pub const USERS: ResourceSchema = ResourceSchema {
    table: "users",
    columns: "id, username, email, role, active, photographer_id, organizer_id, avatar_id, created_at",
    exact_fields: &[
        exact("role", FieldKind::Text),
        exact("active", FieldKind::Bool),
        exact("photographer_id", FieldKind::Int),
        exact("organizer_id", FieldKind::Int),
    ],
    text_fields: &["username", "email"],
    sortable: &["id", "username", "email", "created_at"],
};

pub const PHOTOGRAPHERS: ResourceSchema = ResourceSchema {
    table: "photographers",
    columns: "id, name, bio, website, avatar_id, is_beginner, created_at",
    exact_fields: &[exact("is_beginner", FieldKind::Bool)],
    text_fields: &["name", "bio"],
    sortable: &["id", "name", "created_at"],
};

pub const ORGANIZERS: ResourceSchema = ResourceSchema {
    table: "organizers",
    columns: "id, name, description, website, avatar_id, is_beginner, created_at",
    exact_fields: &[exact("is_beginner", FieldKind::Bool)],
    text_fields: &["name", "description"],
    sortable: &["id", "name", "created_at"],
};

pub const EVENTS: ResourceSchema = ResourceSchema {
    table: "events",
    columns: "id, name, description, location, date, organizer_id, cover_image_id, created_at",
    exact_fields: &[
        exact("organizer_id", FieldKind::Int),
        exact("date", FieldKind::Date),
    ],
    text_fields: &["name", "location", "description"],
    sortable: &["id", "name", "date", "location", "created_at"],
};

pub const PHOTOS: ResourceSchema = ResourceSchema {
    table: "photos",
    columns: "id, event_id, photographer_id, likes, date, created_at",
    exact_fields: &[
        exact("event_id", FieldKind::Int),
        exact("photographer_id", FieldKind::Int),
        exact("date", FieldKind::Date),
    ],
    text_fields: &[],
    sortable: &["id", "likes", "date", "created_at"],
};

pub const TAGS: ResourceSchema = ResourceSchema {
    table: "tags",
    columns: "id, name",
    exact_fields: &[],
    text_fields: &["name"],
    sortable: &["id", "name"],
};

// ============================================================================
// Pagination
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// Anything other than `desc` (any case) sorts ascending.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some(value) if value.trim().eq_ignore_ascii_case("desc") => Self::Desc,
            _ => Self::Asc,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub offset: i64,
    pub sort_by: &'static str,
    pub sort_order: SortOrder,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            offset: 0,
            sort_by: DEFAULT_SORT_COLUMN,
            sort_order: SortOrder::Asc,
        }
    }
}

fn positive_or(raw: Option<&String>, default: i64) -> i64 {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v >= 1)
        .unwrap_or(default)
}

/// `page`, `limit`, `sortBy`, `sortOrder`. `limit` has no upper bound.
pub fn parse_pagination_params(
    params: &HashMap<String, String>,
    schema: &ResourceSchema,
) -> Pagination {
    let page = positive_or(params.get("page"), DEFAULT_PAGE);
    let limit = positive_or(params.get("limit"), DEFAULT_LIMIT);

    let sort_by = match params.get("sortBy").map(|s| s.trim()) {
        Some(requested) if !requested.is_empty() => {
            match schema.sortable.iter().find(|col| **col == requested) {
                Some(col) => *col,
                None => {
                    tracing::debug!(sort_by = %requested, "unsupported sort column, using id");
                    DEFAULT_SORT_COLUMN
                }
            }
        }
        _ => DEFAULT_SORT_COLUMN,
    };

    Pagination {
        page,
        limit,
        offset: (page - 1).saturating_mul(limit),
        sort_by,
        sort_order: SortOrder::parse(params.get("sortOrder").map(String::as_str)),
    }
}

// ============================================================================
// Filtering
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Int(i64),
    Bool(bool),
    Text(String),
}

/// `col = $1 AND col ILIKE $2 ...` plus the values for the placeholders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterClause {
    pub where_clause: String,
    pub values: Vec<SqlParam>,
}

impl FilterClause {
    pub fn is_empty(&self) -> bool {
        self.where_clause.is_empty()
    }

    /// Appends a condition; `condition` receives the placeholder index for `value`.
    pub fn push(&mut self, condition: impl FnOnce(usize) -> String, value: SqlParam) {
        self.values.push(value);
        let sql = condition(self.values.len());
        if !self.where_clause.is_empty() {
            self.where_clause.push_str(" AND ");
        }
        self.where_clause.push_str(&sql);
    }

    /// ` WHERE ...`, or nothing when no condition was added.
    pub fn sql(&self) -> String {
        if self.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.where_clause)
        }
    }

    fn arguments(&self) -> Result<PgArguments, ApiError> {
        let mut args = PgArguments::default();
        for value in &self.values {
            let added = match value {
                SqlParam::Int(v) => args.add(*v),
                SqlParam::Bool(v) => args.add(*v),
                SqlParam::Text(v) => args.add(v.clone()),
            };
            added.map_err(|e| ApiError::Unexpected(e.to_string()))?;
        }
        Ok(args)
    }
}

fn parse_exact(field: &ExactField, raw: &str) -> Result<SqlParam, ApiError> {
    let invalid = || ApiError::validation(format!("Neplatná hodnota parametru {}", field.name));
    match field.kind {
        FieldKind::Int => raw.parse::<i64>().map(SqlParam::Int).map_err(|_| invalid()),
        FieldKind::Bool => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(SqlParam::Bool(true)),
            "false" | "0" => Ok(SqlParam::Bool(false)),
            _ => Err(invalid()),
        },
        FieldKind::Date => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(|d| SqlParam::Text(d.to_string()))
            .map_err(|_| invalid()),
        FieldKind::Text => Ok(SqlParam::Text(raw.to_string())),
    }
}

/// Exact fields become `col = $n`, text fields `col ILIKE $n` with `%value%`.
/// Empty query values are ignored.
pub fn parse_filter_params(
    params: &HashMap<String, String>,
    exact_fields: &[ExactField],
    text_fields: &[&str],
) -> Result<FilterClause, ApiError> {
    let mut filter = FilterClause::default();

    for field in exact_fields {
        let Some(raw) = params.get(field.name).map(|v| v.trim()).filter(|v| !v.is_empty()) else {
            continue;
        };
        let value = parse_exact(field, raw)?;
        let cast = if field.kind == FieldKind::Date { "::date" } else { "" };
        filter.push(|n| format!("{} = ${}{}", field.name, n, cast), value);
    }

    for field in text_fields {
        let Some(raw) = params.get(*field).map(|v| v.trim()).filter(|v| !v.is_empty()) else {
            continue;
        };
        filter.push(
            |n| format!("{} ILIKE ${}", field, n),
            SqlParam::Text(format!("%{}%", raw)),
        );
    }

    Ok(filter)
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub page: i64,
    pub limit: i64,
    pub total_items: i64,
    pub total_pages: i64,
}

impl PageInfo {
    pub fn new(page: i64, limit: i64, total_items: i64) -> Self {
        // Written so a huge `limit` cannot overflow.
        let total_pages = if limit > 0 && total_items > 0 {
            (total_items - 1) / limit + 1
        } else {
            0
        };
        Self {
            page,
            limit,
            total_items,
            total_pages,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub success: bool,
    pub data: Vec<T>,
    pub pagination: PageInfo,
}

// ============================================================================
// Queries
// ============================================================================

/// SELECT and COUNT statements sharing one filter. LIMIT/OFFSET take the two
/// placeholders after the filter values.
pub fn build_list_sql(
    schema: &ResourceSchema,
    filter: &FilterClause,
    pagination: &Pagination,
) -> (String, String) {
    let where_sql = filter.sql();
    let next = filter.values.len() + 1;

    let select = format!(
        "SELECT {} FROM {}{} ORDER BY {} {} LIMIT ${} OFFSET ${}",
        schema.columns,
        schema.table,
        where_sql,
        pagination.sort_by,
        pagination.sort_order.as_sql(),
        next,
        next + 1
    );
    let count = format!("SELECT COUNT(*) FROM {}{}", schema.table, where_sql);

    (select, count)
}

/// One page of `schema` rows plus the total count.
pub async fn handle_get_request<T>(
    pool: &PgPool,
    schema: &ResourceSchema,
    params: &HashMap<String, String>,
) -> Result<ListResponse<T>, ApiError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let pagination = parse_pagination_params(params, schema);
    let filter = parse_filter_params(params, schema.exact_fields, schema.text_fields)?;
    fetch_page(pool, schema, &pagination, &filter).await
}

/// Like `handle_get_request`, for callers that add their own conditions.
pub async fn fetch_page<T>(
    pool: &PgPool,
    schema: &ResourceSchema,
    pagination: &Pagination,
    filter: &FilterClause,
) -> Result<ListResponse<T>, ApiError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let (select_sql, count_sql) = build_list_sql(schema, filter, pagination);
    tracing::debug!(sql = %select_sql, "list query");

    let mut select_args = filter.arguments()?;
    select_args
        .add(pagination.limit)
        .and_then(|_| select_args.add(pagination.offset))
        .map_err(|e| ApiError::Unexpected(e.to_string()))?;
    let count_args = filter.arguments()?;

    let (rows, total) = tokio::try_join!(
        sqlx::query_as_with::<_, T, _>(&select_sql, select_args).fetch_all(pool),
        sqlx::query_scalar_with::<_, i64, _>(&count_sql, count_args).fetch_one(pool),
    )?;

    Ok(ListResponse {
        success: true,
        data: rows,
        pagination: PageInfo::new(pagination.page, pagination.limit, total),
    })
}

pub async fn fetch_by_id<T>(pool: &PgPool, schema: &ResourceSchema, id: i32) -> Result<T, ApiError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let sql = format!(
        "SELECT {} FROM {} WHERE id = $1",
        schema.columns, schema.table
    );
    sqlx::query_as::<_, T>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(ApiError::not_found)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_pagination_defaults() {
        let p = parse_pagination_params(&HashMap::new(), &PHOTOS);
        assert_eq!(p, Pagination::default());
        assert_eq!(p.page, 1);
        assert_eq!(p.limit, 10);
        assert_eq!(p.offset, 0);
        assert_eq!(p.sort_by, "id");
        assert_eq!(p.sort_order.as_sql(), "ASC");
    }

    #[test]
    fn test_pagination_offset() {
        let p = parse_pagination_params(&params(&[("page", "3"), ("limit", "10")]), &PHOTOS);
        assert_eq!(p.offset, 20);

        let p = parse_pagination_params(&params(&[("page", "2"), ("limit", "5")]), &PHOTOS);
        assert_eq!(p.offset, 5);
    }

    #[test]
    fn test_pagination_garbage_falls_back() {
        let p = parse_pagination_params(
            &params(&[("page", "zero"), ("limit", "-4")]),
            &PHOTOS,
        );
        assert_eq!((p.page, p.limit, p.offset), (1, 10, 0));

        let p = parse_pagination_params(&params(&[("page", "0")]), &PHOTOS);
        assert_eq!(p.page, 1);
    }

    #[test]
    fn test_pagination_limit_is_unbounded() {
        let p = parse_pagination_params(&params(&[("limit", "100000")]), &PHOTOS);
        assert_eq!(p.limit, 100_000);
    }

    #[test]
    fn test_sort_allowlist() {
        let p = parse_pagination_params(
            &params(&[("sortBy", "likes"), ("sortOrder", "desc")]),
            &PHOTOS,
        );
        assert_eq!(p.sort_by, "likes");
        assert_eq!(p.sort_order, SortOrder::Desc);

        let p = parse_pagination_params(
            &params(&[("sortBy", "likes; DROP TABLE photos"), ("sortOrder", "DESC; --")]),
            &PHOTOS,
        );
        assert_eq!(p.sort_by, "id");
        assert_eq!(p.sort_order, SortOrder::Asc);
    }

    #[test]
    fn test_filter_clause_combines_exact_and_text() {
        let filter = parse_filter_params(
            &params(&[("name", "fur"), ("organizer_id", "4"), ("location", "Brno")]),
            EVENTS.exact_fields,
            EVENTS.text_fields,
        )
        .unwrap();

        assert_eq!(
            filter.where_clause,
            "organizer_id = $1 AND name ILIKE $2 AND location ILIKE $3"
        );
        assert_eq!(
            filter.values,
            vec![
                SqlParam::Int(4),
                SqlParam::Text("%fur%".into()),
                SqlParam::Text("%Brno%".into()),
            ]
        );
    }

    #[test]
    fn test_filter_clause_empty_when_nothing_matches() {
        let filter = parse_filter_params(
            &params(&[("unknown", "x"), ("name", "  ")]),
            EVENTS.exact_fields,
            EVENTS.text_fields,
        )
        .unwrap();
        assert!(filter.is_empty());
        assert!(filter.values.is_empty());
        assert_eq!(filter.sql(), "");
    }

    #[test]
    fn test_filter_typed_values() {
        let filter = parse_filter_params(
            &params(&[("is_beginner", "true")]),
            PHOTOGRAPHERS.exact_fields,
            &[],
        )
        .unwrap();
        assert_eq!(filter.values, vec![SqlParam::Bool(true)]);

        let filter =
            parse_filter_params(&params(&[("date", "2024-05-01")]), EVENTS.exact_fields, &[])
                .unwrap();
        assert_eq!(filter.where_clause, "date = $1::date");
    }

    #[test]
    fn test_filter_rejects_mistyped_values() {
        let err = parse_filter_params(&params(&[("event_id", "abc")]), PHOTOS.exact_fields, &[])
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        assert!(
            parse_filter_params(&params(&[("date", "01/05/2024")]), PHOTOS.exact_fields, &[])
                .is_err()
        );
    }

    #[test]
    fn test_filter_push_numbers_placeholders() {
        let mut filter = parse_filter_params(
            &params(&[("event_id", "2")]),
            PHOTOS.exact_fields,
            PHOTOS.text_fields,
        )
        .unwrap();
        filter.push(
            |n| format!("id IN (SELECT photo_id FROM photo_tags WHERE tag_id = ${n})"),
            SqlParam::Int(9),
        );
        assert_eq!(
            filter.sql(),
            " WHERE event_id = $1 AND id IN (SELECT photo_id FROM photo_tags WHERE tag_id = $2)"
        );
    }

    #[test]
    fn test_build_list_sql() {
        let filter = parse_filter_params(
            &params(&[("photographer_id", "3")]),
            PHOTOS.exact_fields,
            PHOTOS.text_fields,
        )
        .unwrap();
        let pagination = parse_pagination_params(
            &params(&[("sortBy", "likes"), ("sortOrder", "desc")]),
            &PHOTOS,
        );

        let (select, count) = build_list_sql(&PHOTOS, &filter, &pagination);
        assert_eq!(
            select,
            "SELECT id, event_id, photographer_id, likes, date, created_at FROM photos \
             WHERE photographer_id = $1 ORDER BY likes DESC LIMIT $2 OFFSET $3"
        );
        assert_eq!(count, "SELECT COUNT(*) FROM photos WHERE photographer_id = $1");
    }

    #[test]
    fn test_build_list_sql_without_filter() {
        let (select, count) =
            build_list_sql(&TAGS, &FilterClause::default(), &Pagination::default());
        assert_eq!(select, "SELECT id, name FROM tags ORDER BY id ASC LIMIT $1 OFFSET $2");
        assert_eq!(count, "SELECT COUNT(*) FROM tags");
    }

    #[test]
    fn test_users_schema_never_selects_password_hash() {
        assert!(!USERS.columns.contains("password_hash"));
    }

    #[test]
    fn test_page_info_totals() {
        assert_eq!(PageInfo::new(3, 10, 25).total_pages, 3);
        assert_eq!(PageInfo::new(2, 5, 12).total_pages, 3);
        assert_eq!(PageInfo::new(1, 10, 10).total_pages, 1);
        assert_eq!(PageInfo::new(1, 10, 0).total_pages, 0);
    }

    #[test]
    fn test_huge_limit_does_not_overflow() {
        let max = i64::MAX.to_string();
        let p = parse_pagination_params(&params(&[("page", "3"), ("limit", &max)]), &PHOTOS);
        assert_eq!(p.limit, i64::MAX);
        assert_eq!(p.offset, i64::MAX);

        let info = PageInfo::new(1, i64::MAX, 12);
        assert_eq!(info.total_pages, 1);
        assert_eq!(PageInfo::new(1, i64::MAX, i64::MAX).total_pages, 1);
        assert_eq!(PageInfo::new(1, i64::MAX, 0).total_pages, 0);
    }

    #[test]
    fn test_last_page_window_is_partial() {
        let rows: Vec<i64> = (1..=25).collect();
        let p = parse_pagination_params(&params(&[("page", "3"), ("limit", "10")]), &PHOTOS);
        let window: Vec<_> = rows
            .iter()
            .skip(p.offset as usize)
            .take(p.limit as usize)
            .collect();
        assert_eq!(window.len(), 5);
        assert_eq!(PageInfo::new(p.page, p.limit, rows.len() as i64).total_pages, 3);
    }

    #[test]
    fn test_page_info_serializes_camel_case() {
        let json = serde_json::to_value(PageInfo::new(1, 10, 25)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "page": 1, "limit": 10, "totalItems": 25, "totalPages": 3 })
        );
    }
}
