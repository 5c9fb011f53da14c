use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Catalog product. Default collection order is newest first.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub description: String,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    pub category_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub price: Decimal,
    pub user_id: Uuid,
    pub receive_type: ReceiveType,
    #[sea_orm(column_type = "Decimal(Some((2, 1)))")]
    pub rating: Decimal,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id",
        on_delete = "Restrict"
    )]
    Category,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(has_many = "super::product_tag::Entity")]
    ProductTags,
    #[sea_orm(has_many = "super::product_image::Entity")]
    ProductImages,
    #[sea_orm(has_many = "super::product_attribute::Entity")]
    ProductAttributes,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::product_image::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductImages.def()
    }
}

impl Related<super::product_attribute::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductAttributes.def()
    }
}

impl Related<super::tag::Entity> for Entity {
    fn to() -> RelationDef {
        super::product_tag::Relation::Tag.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::product_tag::Relation::Product.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// How the buyer receives the product.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    utoipa::ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(15))")]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReceiveType {
    /// Made to order
    #[default]
    #[sea_orm(string_value = "order")]
    Order,
    #[sea_orm(string_value = "in_stock")]
    InStock,
    /// Pickup only
    #[sea_orm(string_value = "pickup")]
    #[serde(alias = "pick_up")]
    Pickup,
}
