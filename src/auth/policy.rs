//! Access policies: which requester may perform which operation on which resource.

use std::fmt;
use uuid::Uuid;

use super::{AuthUser, CREDENTIALS_NOT_PROVIDED, PERMISSION_DENIED};
use crate::config::TaxonomyWritePolicy;
use crate::errors::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Resource {
    Product,
    ProductImage,
    ProductAttribute,
    Category,
    Tag,
    Account,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    List,
    Retrieve,
    Create,
    Update,
    Delete,
}

/// Composable permission predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    AllowAny,
    Authenticated,
    Admin,
    /// Requester is the owner of the resource being acted on.
    Owner,
    All(&'static [Policy]),
    Any(&'static [Policy]),
}

impl Policy {
    pub const OWNER_OR_ADMIN: Policy = Policy::All(&[
        Policy::Authenticated,
        Policy::Any(&[Policy::Owner, Policy::Admin]),
    ]);

    pub fn allows(&self, requester: Option<&AuthUser>, owner: Option<Uuid>) -> bool {
        match self {
            Policy::AllowAny => true,
            Policy::Authenticated => requester.is_some(),
            Policy::Admin => requester.map_or(false, AuthUser::is_admin),
            Policy::Owner => match (requester, owner) {
                (Some(user), Some(owner)) => user.id() == owner,
                _ => false,
            },
            Policy::All(policies) => policies.iter().all(|p| p.allows(requester, owner)),
            Policy::Any(policies) => policies.iter().any(|p| p.allows(requester, owner)),
        }
    }

    /// 401 for an anonymous requester, 403 for a signed-in one.
    pub fn authorize(
        &self,
        requester: Option<&AuthUser>,
        owner: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        if self.allows(requester, owner) {
            return Ok(());
        }
        match requester {
            None => Err(ServiceError::Unauthorized(CREDENTIALS_NOT_PROVIDED.into())),
            Some(_) => Err(ServiceError::Forbidden(PERMISSION_DENIED.into())),
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |f: &mut fmt::Formatter<'_>, policies: &[Policy], sep: &str| {
            write!(f, "(")?;
            for (i, p) in policies.iter().enumerate() {
                if i > 0 {
                    write!(f, " {} ", sep)?;
                }
                write!(f, "{}", p)?;
            }
            write!(f, ")")
        };
        match self {
            Policy::AllowAny => write!(f, "allow_any"),
            Policy::Authenticated => write!(f, "authenticated"),
            Policy::Admin => write!(f, "admin"),
            Policy::Owner => write!(f, "owner"),
            Policy::All(policies) => join(f, policies, "and"),
            Policy::Any(policies) => join(f, policies, "or"),
        }
    }
}

/// Static (resource, action) lookup. Only taxonomy writes vary with configuration.
///
/// For image and attribute creation the owner passed to [`Policy::authorize`] is the
/// owner of the parent product.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyTable {
    taxonomy_write: TaxonomyWritePolicy,
}

impl PolicyTable {
    pub fn new(taxonomy_write: TaxonomyWritePolicy) -> Self {
        Self { taxonomy_write }
    }

    pub fn policy(&self, resource: Resource, action: Action) -> Policy {
        use Action::*;
        use Resource::*;

        match (resource, action) {
            (Account, Create) => Policy::AllowAny,
            (Account, _) => Policy::Authenticated,

            (_, List | Retrieve) => Policy::AllowAny,

            (Category | Tag, _) if self.taxonomy_write == TaxonomyWritePolicy::Admin => {
                Policy::Admin
            }
            (Category | Tag | Product, Create) => Policy::Authenticated,
            (ProductImage | ProductAttribute, Create) => Policy::OWNER_OR_ADMIN,
            (_, Update | Delete) => Policy::OWNER_OR_ADMIN,
        }
    }

    pub fn authorize(
        &self,
        resource: Resource,
        action: Action,
        requester: Option<&AuthUser>,
        owner: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        let policy = self.policy(resource, action);
        policy.authorize(requester, owner).map_err(|err| {
            tracing::debug!(%resource, %action, %policy, "access denied");
            err
        })
    }
}
