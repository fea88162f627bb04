use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use serde::Serialize;

use crate::auth::{AuthGate, Claims, Role};
use crate::error::ApiError;

/// Authenticated caller injected into request extensions by [`require_roles`]
#[derive(Clone, Debug, Serialize)]
pub struct AuthUser {
    pub subject: String,
    pub role: Role,
    pub expires_at: i64,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            subject: claims.sub,
            role: claims.role,
            expires_at: claims.exp,
        }
    }
}

/// Role policy for one group of routes; empty `roles` admits any authenticated caller
#[derive(Clone)]
pub struct RoleRequirement {
    pub gate: AuthGate,
    pub roles: &'static [Role],
    pub audit: bool,
}

impl RoleRequirement {
    pub fn authenticated(gate: AuthGate, audit: bool) -> Self {
        Self::roles(gate, &[], audit)
    }

    pub fn roles(gate: AuthGate, roles: &'static [Role], audit: bool) -> Self {
        Self { gate, roles, audit }
    }
}

/// Authorize the request against a [`RoleRequirement`] and expose the caller as [`AuthUser`]
pub async fn require_roles(
    State(requirement): State<RoleRequirement>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = requirement
        .gate
        .authorize(request.headers(), requirement.roles)
        .into_result()?;

    if requirement.audit {
        tracing::info!(
            target: "audit",
            subject = %claims.sub,
            role = %claims.role,
            method = %request.method(),
            path = %request.uri().path(),
            "Authorized request"
        );
    }

    request.extensions_mut().insert(AuthUser::from(claims));

    Ok(next.run(request).await)
}
