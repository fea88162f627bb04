pub mod auth;
pub mod response;

pub use auth::{require_roles, AuthUser, RoleRequirement};
pub use response::{ApiResponse, ApiResult};
