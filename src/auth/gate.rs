use std::sync::Arc;

use axum::http::HeaderMap;

use super::{ClaimResolver, Claims, Role};
use crate::error::ApiError;

/// Result of authorizing a request for one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// No valid claim could be resolved (HTTP 401)
    Unauthenticated,
    /// Valid claim, role not allowed for the operation (HTTP 403)
    Forbidden,
    Authorized(Claims),
}

impl Outcome {
    pub fn is_authorized(&self) -> bool {
        matches!(self, Outcome::Authorized(_))
    }

    pub fn into_result(self) -> Result<Claims, ApiError> {
        match self {
            Outcome::Authorized(claims) => Ok(claims),
            Outcome::Unauthenticated => Err(unauthenticated()),
            Outcome::Forbidden => Err(forbidden()),
        }
    }
}

fn unauthenticated() -> ApiError {
    ApiError::unauthorized("Authentication required")
}

fn forbidden() -> ApiError {
    ApiError::forbidden("Insufficient role for this operation")
}

/// Decide an operation against an already-resolved claim.
///
/// An empty `required_roles` admits any authenticated caller; otherwise the
/// claim's role must be listed exactly.
pub fn authorize_claim(claim: Option<Claims>, required_roles: &[Role]) -> Outcome {
    let Some(claims) = claim else {
        return Outcome::Unauthenticated;
    };

    if !required_roles.is_empty() && !required_roles.contains(&claims.role) {
        tracing::warn!(
            subject = %claims.sub,
            role = %claims.role,
            "Authorization denied: role not in {:?}",
            required_roles
        );
        return Outcome::Forbidden;
    }

    Outcome::Authorized(claims)
}

/// Authenticates callers through a [`ClaimResolver`] and authorizes them by role
#[derive(Clone)]
pub struct AuthGate {
    resolver: Arc<dyn ClaimResolver>,
}

impl AuthGate {
    pub fn new(resolver: Arc<dyn ClaimResolver>) -> Self {
        Self { resolver }
    }

    pub fn resolve(&self, headers: &HeaderMap) -> Option<Claims> {
        self.resolver.resolve(headers)
    }

    pub fn authorize(&self, headers: &HeaderMap, required_roles: &[Role]) -> Outcome {
        authorize_claim(self.resolve(headers), required_roles)
    }

    /// Resolve the caller and pick the first table entry admitting their role
    pub fn dispatch<'t, T>(&self, headers: &HeaderMap, table: &'t RoleTable<T>) -> Dispatch<'t, T> {
        match self.resolve(headers) {
            None => Dispatch::Unauthenticated,
            Some(claims) => table.dispatch(claims),
        }
    }
}

struct RoleEntry<T> {
    roles: Vec<Role>,
    handler: T,
}

/// Ordered role-to-handler routing table.
///
/// Entries are checked in insertion order and the first whose role list
/// contains the caller's role wins. Overlapping entries are allowed but only
/// the earliest is reachable for a shared role.
pub struct RoleTable<T> {
    entries: Vec<RoleEntry<T>>,
}

impl<T> Default for RoleTable<T> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<T> RoleTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(mut self, roles: &[Role], handler: T) -> Self {
        self.entries.push(RoleEntry {
            roles: roles.to_vec(),
            handler,
        });
        self
    }

    pub fn select(&self, role: Role) -> Option<&T> {
        self.entries
            .iter()
            .find(|entry| entry.roles.contains(&role))
            .map(|entry| &entry.handler)
    }

    pub fn dispatch(&self, claims: Claims) -> Dispatch<'_, T> {
        match self.select(claims.role) {
            Some(handler) => Dispatch::Matched { claims, handler },
            None => {
                tracing::warn!(subject = %claims.sub, role = %claims.role, "No handler registered for role");
                Dispatch::Forbidden
            }
        }
    }
}

/// Outcome of a [`RoleTable`] lookup for a request
#[derive(Debug)]
pub enum Dispatch<'t, T> {
    Unauthenticated,
    Forbidden,
    Matched { claims: Claims, handler: &'t T },
}

impl<'t, T> Dispatch<'t, T> {
    pub fn into_result(self) -> Result<(Claims, &'t T), ApiError> {
        match self {
            Dispatch::Matched { claims, handler } => Ok((claims, handler)),
            Dispatch::Unauthenticated => Err(unauthenticated()),
            Dispatch::Forbidden => Err(forbidden()),
        }
    }
}
