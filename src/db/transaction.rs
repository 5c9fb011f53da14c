/*!
 * Transaction Helper Utilities
 *
 * Scoped transactions that keep the caller's error type intact
 */

use metrics::counter;
use sea_orm::{DatabaseConnection, DatabaseTransaction, DbErr, TransactionTrait};
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, warn};

/// Type alias for boxed future used in transactions
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Execute a function within a database transaction
///
/// Commits when `f` returns `Ok`, rolls back otherwise. Unlike
/// `TransactionTrait::transaction` the error returned by `f` is handed back unchanged,
/// so field-level validation failures raised mid-transaction still reach the client.
///
/// The closure must own what it captures (clone `Arc`s and ids into it).
///
/// ```rust,ignore
/// let product = transaction_scope(&db, move |txn| {
///     Box::pin(async move {
///         let product = new_product.insert(txn).await?;
///         product_tag::Entity::insert_many(links).exec_without_returning(txn).await?;
///         Ok(product)
///     })
/// })
/// .await?;
/// ```
pub async fn transaction_scope<F, T, E>(db: &DatabaseConnection, f: F) -> Result<T, E>
where
    F: for<'a> FnOnce(&'a DatabaseTransaction) -> BoxFuture<'a, Result<T, E>>,
    E: From<DbErr>,
{
    let txn = db.begin().await?;

    match f(&txn).await {
        Ok(value) => {
            txn.commit().await?;
            counter!("storefront_db.transactions.committed", 1);
            debug!("transaction committed");
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = txn.rollback().await {
                warn!("transaction rollback failed: {}", rollback_err);
            }
            counter!("storefront_db.transactions.rolled_back", 1);
            debug!("transaction rolled back");
            Err(err)
        }
    }
}
