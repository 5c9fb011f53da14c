//! Search, filter, order and paginate over the product collection.
//!
//! [`ProductQueryPipeline`] turns raw list parameters into a [`ProductQuery`], which is
//! then applied to a `Select<product::Entity>`. The set of orderable fields is a
//! constant handed to the pipeline at construction.

use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, Func, LikeExpr, Query, SimpleExpr};
use sea_orm::{ColumnTrait, Condition, Order, QueryFilter, QueryOrder, Select};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::dto::products::ProductListParams;
use crate::dto::PageRequest;
use crate::entities::product::{self, ReceiveType};
use crate::entities::product_tag;
use crate::errors::{FieldErrors, ServiceError};

/// Orderable product fields, keyed by their query-string name.
pub const PRODUCT_ORDERING: &[(&str, product::Column)] = &[
    ("name", product::Column::Name),
    ("price", product::Column::Price),
    ("created_at", product::Column::CreatedAt),
    ("rating", product::Column::Rating),
    ("receive_type", product::Column::ReceiveType),
];

pub const DEFAULT_ORDERING: &str = "-created_at";

const LIKE_ESCAPE: char = '\\';

#[derive(Debug, Clone, Copy)]
pub struct Ordering {
    pub field: &'static str,
    pub column: product::Column,
    pub descending: bool,
}

impl Ordering {
    fn order(&self) -> Order {
        if self.descending {
            Order::Desc
        } else {
            Order::Asc
        }
    }
}

/// Equality and range filters, AND-combined.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category: Option<Uuid>,
    /// Any-of membership
    pub tags: Vec<Uuid>,
    pub user: Option<Uuid>,
    pub is_published: Option<bool>,
    pub receive_type: Option<ReceiveType>,
    pub rating: Option<Decimal>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
}

impl ProductFilter {
    pub fn condition(&self) -> Condition {
        let mut condition = Condition::all();
        if let Some(category) = self.category {
            condition = condition.add(product::Column::CategoryId.eq(category));
        }
        if !self.tags.is_empty() {
            condition = condition.add(
                product::Column::Id.in_subquery(
                    Query::select()
                        .column(product_tag::Column::ProductId)
                        .from(product_tag::Entity)
                        .and_where(product_tag::Column::TagId.is_in(self.tags.clone()))
                        .to_owned(),
                ),
            );
        }
        if let Some(user) = self.user {
            condition = condition.add(product::Column::UserId.eq(user));
        }
        if let Some(is_published) = self.is_published {
            condition = condition.add(product::Column::IsPublished.eq(is_published));
        }
        if let Some(receive_type) = self.receive_type {
            condition = condition.add(product::Column::ReceiveType.eq(receive_type));
        }
        if let Some(rating) = self.rating {
            condition = condition.add(product::Column::Rating.eq(rating));
        }
        if let Some(min_price) = self.min_price {
            condition = condition.add(product::Column::Price.gte(min_price));
        }
        if let Some(max_price) = self.max_price {
            condition = condition.add(product::Column::Price.lte(max_price));
        }
        condition
    }
}

/// A fully resolved listing request.
#[derive(Debug, Clone)]
pub struct ProductQuery {
    pub search: Option<String>,
    pub filter: ProductFilter,
    pub ordering: Ordering,
    pub page: PageRequest,
}

impl ProductQuery {
    /// Adds search, filters and ordering to `select`. Pagination is left to the caller.
    pub fn apply(&self, select: Select<product::Entity>) -> Select<product::Entity> {
        let mut select = select;
        if let Some(term) = &self.search {
            select = select.filter(search_condition(term));
        }
        select
            .filter(self.filter.condition())
            .order_by(self.ordering.column, self.ordering.order())
            .order_by_asc(product::Column::Id)
    }
}

/// Case-insensitive substring match on name, description or content.
pub fn search_condition(term: &str) -> Condition {
    let pattern = format!("%{}%", escape_like(&term.to_lowercase()));
    Condition::any()
        .add(contains_ci(product::Column::Name, &pattern))
        .add(contains_ci(product::Column::Description, &pattern))
        .add(contains_ci(product::Column::Content, &pattern))
}

fn contains_ci(column: product::Column, pattern: &str) -> SimpleExpr {
    Expr::expr(Func::lower(Expr::col((product::Entity, column))))
        .like(LikeExpr::new(pattern).escape(LIKE_ESCAPE))
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

#[derive(Debug, Clone, Copy)]
pub struct ProductQueryPipeline {
    ordering_fields: &'static [(&'static str, product::Column)],
    default_page_size: u64,
    max_page_size: u64,
}

impl ProductQueryPipeline {
    pub fn new(
        ordering_fields: &'static [(&'static str, product::Column)],
        default_page_size: u64,
        max_page_size: u64,
    ) -> Self {
        Self {
            ordering_fields,
            default_page_size,
            max_page_size,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            PRODUCT_ORDERING,
            config.api_default_page_size,
            config.api_max_page_size,
        )
    }

    fn lookup(&self, raw: &str) -> Option<Ordering> {
        let raw = raw.trim();
        let (key, descending) = match raw.strip_prefix('-') {
            Some(key) => (key, true),
            None => (raw, false),
        };
        self.ordering_fields
            .iter()
            .find(|(name, _)| *name == key)
            .map(|&(field, column)| Ordering {
                field,
                column,
                descending,
            })
    }

    /// Unknown or missing keys fall back to newest first.
    pub fn ordering(&self, raw: Option<&str>) -> Ordering {
        raw.and_then(|raw| self.lookup(raw))
            .or_else(|| self.lookup(DEFAULT_ORDERING))
            .unwrap_or(Ordering {
                field: "created_at",
                column: product::Column::CreatedAt,
                descending: true,
            })
    }

    pub fn prepare(&self, params: ProductListParams) -> Result<ProductQuery, ServiceError> {
        let mut errors = FieldErrors::new();
        let tags = match params.tags.as_deref() {
            Some(raw) => parse_id_list(raw, "tags", &mut errors),
            None => Vec::new(),
        };
        errors.into_result()?;

        let search = params
            .search
            .map(|term| term.trim().to_string())
            .filter(|term| !term.is_empty());

        Ok(ProductQuery {
            search,
            filter: ProductFilter {
                category: params.category,
                tags,
                user: params.user,
                is_published: params.is_published,
                receive_type: params.receive_type,
                rating: params.rating,
                min_price: params.min_price,
                max_price: params.max_price,
            },
            ordering: self.ordering(params.ordering.as_deref()),
            page: PageRequest::resolve(
                params.page,
                params.page_size,
                self.default_page_size,
                self.max_page_size,
            ),
        })
    }
}

fn parse_id_list(raw: &str, field: &str, errors: &mut FieldErrors) -> Vec<Uuid> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter_map(|part| match Uuid::parse_str(part) {
            Ok(id) => Some(id),
            Err(_) => {
                errors.add(field, format!("\"{}\" is not a valid UUID.", part));
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;
    use sea_orm::{DbBackend, EntityTrait, QueryTrait};

    fn pipeline() -> ProductQueryPipeline {
        ProductQueryPipeline::new(PRODUCT_ORDERING, 10, 100)
    }

    fn sql(query: &ProductQuery) -> String {
        query
            .apply(product::Entity::find())
            .build(DbBackend::Sqlite)
            .to_string()
    }

    #[rstest]
    #[case(Some("price"), "price", false)]
    #[case(Some("-price"), "price", true)]
    #[case(Some(" -rating "), "rating", true)]
    #[case(Some("receive_type"), "receive_type", false)]
    #[case(Some("password_hash"), "created_at", true)]
    #[case(Some("-"), "created_at", true)]
    #[case(None, "created_at", true)]
    fn ordering_uses_allow_list(
        #[case] raw: Option<&str>,
        #[case] field: &str,
        #[case] descending: bool,
    ) {
        let ordering = pipeline().ordering(raw);
        assert_eq!(ordering.field, field);
        assert_eq!(ordering.descending, descending);
    }

    #[test]
    fn ordering_restricted_to_injected_fields() {
        const NAME_ONLY: &[(&str, product::Column)] = &[("name", product::Column::Name)];
        let pipeline = ProductQueryPipeline::new(NAME_ONLY, 10, 100);
        assert_eq!(pipeline.ordering(Some("name")).field, "name");
        // created_at is not orderable here, yet the default still applies
        assert_eq!(pipeline.ordering(Some("price")).field, "created_at");
    }

    #[test]
    fn blank_search_is_ignored() {
        let query = pipeline()
            .prepare(ProductListParams {
                search: Some("   ".into()),
                ..Default::default()
            })
            .unwrap();
        assert!(query.search.is_none());
        assert!(!sql(&query).contains("LIKE"));
    }

    #[test]
    fn search_matches_three_columns_case_insensitively() {
        let query = pipeline()
            .prepare(ProductListParams {
                search: Some("Foo".into()),
                ..Default::default()
            })
            .unwrap();
        let sql = sql(&query);
        assert_eq!(sql.matches(" LIKE ").count(), 3);
        assert_eq!(sql.matches("LOWER(\"products\".").count(), 3);
        assert!(sql.contains("'%foo%'"));
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn filters_and_ordering_reach_sql() {
        let tag = Uuid::new_v4();
        let query = pipeline()
            .prepare(ProductListParams {
                tags: Some(format!("{}, ", tag)),
                min_price: Some(Decimal::new(10, 0)),
                max_price: Some(Decimal::new(20, 0)),
                is_published: Some(true),
                ordering: Some("-price".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(query.filter.tags, vec![tag]);

        let sql = sql(&query);
        assert!(sql.contains("\"product_tags\""));
        assert!(sql.contains("\"price\" >="));
        assert!(sql.contains("\"price\" <="));
        assert!(sql.contains("\"price\" DESC"));
        assert!(sql.contains("\"id\" ASC"));
    }

    #[test]
    fn malformed_tag_ids_are_field_errors() {
        let result = pipeline().prepare(ProductListParams {
            tags: Some("not-a-uuid".into()),
            ..Default::default()
        });
        assert_matches!(result, Err(ServiceError::ValidationError(fields)) if fields.contains("tags"));
    }

    #[test]
    fn page_size_is_capped() {
        let query = pipeline()
            .prepare(ProductListParams {
                page: Some(0),
                page_size: Some(1_000),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(query.page, PageRequest { page: 1, page_size: 100 });
    }
}
