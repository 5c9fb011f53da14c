//! SeaORM entities for the catalog schema created by [`crate::migrator`].

pub mod auth_token;
pub mod category;
pub mod product;
pub mod product_attribute;
pub mod product_image;
pub mod product_tag;
pub mod tag;
pub mod user;
