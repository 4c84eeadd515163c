//! Builds the listing query from a search request and renders it to SQL.

use std::collections::BTreeMap;

use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};

use crate::config::ListingConfig;
use crate::users::dto::ListUsersRequest;
use crate::users::filter::{translate, FieldValue, FilterValue, Predicate};
use crate::users::repo_types::{Column, PUBLIC_COLUMNS};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    #[default]
    Id,
    Name,
    Email,
    Phone,
    BirthDate,
    Weight,
    Height,
}

impl From<SortField> for Column {
    fn from(f: SortField) -> Self {
        match f {
            SortField::Id => Column::Id,
            SortField::Name => Column::Name,
            SortField::Email => Column::Email,
            SortField::Phone => Column::Phone,
            SortField::BirthDate => Column::BirthDate,
            SortField::Weight => Column::Weight,
            SortField::Height => Column::Height,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Sort {
    #[serde(default)]
    pub field: SortField,
    #[serde(default)]
    pub direction: SortDirection,
}

/// Everything the store needs to run one listing.
#[derive(Debug, Clone, PartialEq)]
pub struct UserQuery {
    pub predicates: BTreeMap<Column, Predicate<FieldValue>>,
    pub limit: i64,
    pub offset: i64,
    pub sort: Sort,
}

/// `(limit, offset)` for a 1-based page. Non-positive page or page size
/// fall back to the first page and the default size.
pub fn paginate(page: Option<i64>, page_size: Option<i64>, cfg: &ListingConfig) -> (i64, i64) {
    let page = page.filter(|p| *p >= 1).unwrap_or(1);
    let limit = page_size
        .filter(|s| *s >= 1)
        .unwrap_or(cfg.default_page_size)
        .clamp(1, cfg.max_page_size.max(1));
    let offset = (page - 1).saturating_mul(limit);
    (limit, offset)
}

pub fn compose(req: &ListUsersRequest, cfg: &ListingConfig) -> UserQuery {
    let mut predicates = BTreeMap::new();

    for (column, value) in [
        (Column::Name, &req.name),
        (Column::Email, &req.email),
        (Column::Phone, &req.phone),
    ] {
        if let Some(value) = value {
            if let Some(p) = search_predicate(value, cfg.case_insensitive_search) {
                predicates.insert(column, p);
            }
        }
    }

    if let Some(p) = req.birth_date.clone().and_then(translate) {
        predicates.insert(Column::BirthDate, p.map(FieldValue::from));
    }
    for (column, value) in [(Column::Height, &req.height), (Column::Weight, &req.weight)] {
        if let Some(p) = value.clone().and_then(translate) {
            predicates.insert(column, p.map(FieldValue::from));
        }
    }

    let (limit, offset) = paginate(req.page, req.page_size, cfg);

    UserQuery {
        predicates,
        limit,
        offset,
        sort: req.sort.unwrap_or_default(),
    }
}

/// Free-text fields: a non-empty string becomes a substring match, any other
/// shape goes through the normal translation.
fn search_predicate(
    value: &FilterValue<String>,
    case_insensitive: bool,
) -> Option<Predicate<FieldValue>> {
    match value {
        FilterValue::Scalar(Some(s)) if !s.is_empty() => Some(Predicate::Contains {
            needle: s.clone(),
            case_insensitive,
        }),
        other => translate(other.clone()).map(|p| p.map(FieldValue::from)),
    }
}

/// `%needle%` with LIKE metacharacters in the needle escaped by `\`.
pub fn like_pattern(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len() + 2);
    out.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

fn push_value(qb: &mut QueryBuilder<'static, Postgres>, value: &FieldValue) {
    match value {
        FieldValue::Int(v) => qb.push_bind(*v),
        FieldValue::Text(v) => qb.push_bind(v.clone()),
        FieldValue::Date(v) => qb.push_bind(*v),
    };
}

fn push_predicate(
    qb: &mut QueryBuilder<'static, Postgres>,
    column: Column,
    p: &Predicate<FieldValue>,
) {
    let col = column.as_sql();
    match p {
        Predicate::Eq(v) => {
            qb.push(col).push(" = ");
            push_value(qb, v);
        }
        Predicate::IsNull => {
            qb.push(col).push(" IS NULL");
        }
        Predicate::Gte(v) => {
            qb.push(col).push(" >= ");
            push_value(qb, v);
        }
        Predicate::Lte(v) => {
            qb.push(col).push(" <= ");
            push_value(qb, v);
        }
        Predicate::Between(lo, hi) => {
            qb.push(col).push(" BETWEEN ");
            push_value(qb, lo);
            qb.push(" AND ");
            push_value(qb, hi);
        }
        Predicate::In { values, or_null } => match (values.is_empty(), *or_null) {
            (true, true) => {
                qb.push(col).push(" IS NULL");
            }
            (true, false) => {
                qb.push("FALSE");
            }
            (false, or_null) => {
                qb.push("(").push(col).push(" IN (");
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        qb.push(", ");
                    }
                    push_value(qb, v);
                }
                qb.push(")");
                if or_null {
                    qb.push(" OR ").push(col).push(" IS NULL");
                }
                qb.push(")");
            }
        },
        Predicate::Contains {
            needle,
            case_insensitive,
        } => {
            let op = if *case_insensitive { " ILIKE " } else { " LIKE " };
            qb.push(col).push(op).push_bind(like_pattern(needle)).push(" ESCAPE '\\'");
        }
    }
}

/// Append ` WHERE a AND b ...` for the given predicates; nothing when empty.
pub fn push_where(
    qb: &mut QueryBuilder<'static, Postgres>,
    predicates: &BTreeMap<Column, Predicate<FieldValue>>,
) {
    for (i, (column, p)) in predicates.iter().enumerate() {
        qb.push(if i == 0 { " WHERE " } else { " AND " });
        push_predicate(qb, *column, p);
    }
}

/// `SELECT <public columns> FROM users ...` for a listing.
pub fn build_select(query: &UserQuery) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT {PUBLIC_COLUMNS} FROM users"));
    push_where(&mut qb, &query.predicates);
    qb.push(" ORDER BY ")
        .push(Column::from(query.sort.field).as_sql())
        .push(" ")
        .push(query.sort.direction.as_sql());
    qb.push(" LIMIT ").push_bind(query.limit);
    qb.push(" OFFSET ").push_bind(query.offset);
    qb
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::date;

    fn request(v: serde_json::Value) -> ListUsersRequest {
        serde_json::from_value(v).expect("list request")
    }

    fn cfg() -> ListingConfig {
        ListingConfig::default()
    }

    #[test]
    fn first_page_defaults() {
        let q = compose(&request(json!({})), &cfg());
        assert_eq!((q.limit, q.offset), (10, 0));
        assert_eq!(
            q.sort,
            Sort {
                field: SortField::Id,
                direction: SortDirection::Asc
            }
        );
        assert!(q.predicates.is_empty());
    }

    #[test]
    fn explicit_pages() {
        let q = compose(&request(json!({"page": 1, "pageSize": 10})), &cfg());
        assert_eq!((q.limit, q.offset), (10, 0));
        let q = compose(&request(json!({"page": 3, "pageSize": 5})), &cfg());
        assert_eq!((q.limit, q.offset), (5, 10));
    }

    #[test]
    fn bad_page_never_goes_negative() {
        assert_eq!(paginate(Some(0), Some(5), &cfg()), (5, 0));
        assert_eq!(paginate(Some(-4), None, &cfg()), (10, 0));
        assert_eq!(paginate(Some(2), Some(0), &cfg()), (10, 10));
    }

    #[test]
    fn page_size_is_capped() {
        assert_eq!(paginate(Some(2), Some(5000), &cfg()), (100, 100));
    }

    #[test]
    fn search_fields_become_substring_matches() {
        let q = compose(&request(json!({"name": "ar", "email": ""})), &cfg());
        assert_eq!(
            q.predicates.get(&Column::Name),
            Some(&Predicate::Contains {
                needle: "ar".into(),
                case_insensitive: false
            })
        );
        // empty string is not a search, it is an equality filter
        assert_eq!(
            q.predicates.get(&Column::Email),
            Some(&Predicate::Eq(FieldValue::Text(String::new())))
        );
    }

    #[test]
    fn search_field_list_is_membership() {
        let q = compose(&request(json!({"phone": ["+79048321919", null]})), &cfg());
        assert_eq!(
            q.predicates.get(&Column::Phone),
            Some(&Predicate::In {
                values: vec![FieldValue::Text("+79048321919".into())],
                or_null: true
            })
        );
    }

    #[test]
    fn empty_ranges_are_dropped() {
        let q = compose(
            &request(json!({"height": {}, "weight": {"gte": null}, "birthDate": {"lte": null}})),
            &cfg(),
        );
        assert!(q.predicates.is_empty());
    }

    #[test]
    fn explicit_null_filters_for_null() {
        let q = compose(&request(json!({"weight": null})), &cfg());
        assert_eq!(q.predicates.get(&Column::Weight), Some(&Predicate::IsNull));
    }

    #[test]
    fn typed_ranges() {
        let q = compose(
            &request(json!({
                "height": {"gte": 0},
                "birthDate": {"gte": "2001-09-11", "lte": "2024-01-01"}
            })),
            &cfg(),
        );
        assert_eq!(
            q.predicates.get(&Column::Height),
            Some(&Predicate::Gte(FieldValue::Int(0)))
        );
        assert_eq!(
            q.predicates.get(&Column::BirthDate),
            Some(&Predicate::Between(
                FieldValue::Date(date!(2001 - 09 - 11)),
                FieldValue::Date(date!(2024 - 01 - 01))
            ))
        );
    }

    #[test]
    fn sort_outside_whitelist_is_rejected() {
        let r: Result<ListUsersRequest, _> =
            serde_json::from_value(json!({"sort": {"field": "password"}}));
        assert!(r.is_err());
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("mail"), "%mail%");
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    #[test]
    fn select_sql_without_filters() {
        let q = compose(&request(json!({})), &cfg());
        let qb = build_select(&q);
        assert_eq!(
            qb.sql(),
            format!("SELECT {PUBLIC_COLUMNS} FROM users ORDER BY id ASC LIMIT $1 OFFSET $2")
        );
    }

    #[test]
    fn select_sql_with_filters_and_sort() {
        let q = compose(
            &request(json!({
                "name": "Al",
                "height": {"gte": 150, "lte": 190},
                "weight": [52, null],
                "sort": {"field": "birthDate", "direction": "DESC"}
            })),
            &cfg(),
        );
        let qb = build_select(&q);
        assert_eq!(
            qb.sql(),
            format!(
                "SELECT {PUBLIC_COLUMNS} FROM users \
                 WHERE name LIKE $1 ESCAPE '\\' \
                 AND height BETWEEN $2 AND $3 \
                 AND (weight IN ($4) OR weight IS NULL) \
                 ORDER BY birth_date DESC LIMIT $5 OFFSET $6"
            )
        );
    }

    #[test]
    fn empty_list_matches_nothing() {
        let mut predicates = BTreeMap::new();
        predicates.insert(
            Column::Height,
            Predicate::In {
                values: vec![],
                or_null: false,
            },
        );
        let mut qb = QueryBuilder::new("SELECT id FROM users");
        push_where(&mut qb, &predicates);
        assert_eq!(qb.sql(), "SELECT id FROM users WHERE FALSE");
    }

    #[test]
    fn insensitive_search_uses_ilike() {
        let cfg = ListingConfig {
            case_insensitive_search: true,
            ..ListingConfig::default()
        };
        let q = compose(&request(json!({"email": "MAIL"})), &cfg);
        let qb = build_select(&q);
        assert!(qb.sql().contains("email ILIKE $1"));
    }
}
