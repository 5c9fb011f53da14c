use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Account holder. Users are deactivated, never hard-deleted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub email: String,
    #[sea_orm(unique)]
    pub phone: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub avatar: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
}

impl Model {
    /// "<last_name> <first_name>", falling back to the phone number.
    pub fn full_name(&self) -> String {
        let name = format!("{} {}", self.last_name, self.first_name);
        let name = name.trim();
        if name.is_empty() {
            self.phone.clone()
        } else {
            name.to_string()
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::auth_token::Entity")]
    AuthToken,
    #[sea_orm(has_many = "super::product::Entity")]
    Products,
}

impl Related<super::auth_token::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AuthToken.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Products.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Account role. `client` and `salesman` are accepted as legacy input spellings.
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
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    #[sea_orm(string_value = "customer")]
    #[serde(alias = "client")]
    Customer,
    #[sea_orm(string_value = "seller")]
    #[serde(alias = "salesman")]
    Seller,
    #[sea_orm(string_value = "admin")]
    Admin,
}
