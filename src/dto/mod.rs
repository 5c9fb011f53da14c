//! Request and response bodies of the HTTP API.

pub mod accounts;
pub mod pagination;
pub mod products;
pub mod taxonomy;

pub use pagination::{Page, PageRequest};
