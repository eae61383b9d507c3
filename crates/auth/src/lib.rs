//! `oficina-auth`: authentication and authorization, decoupled from HTTP and storage.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod password;
pub mod permissions;
pub mod roles;
pub mod user;

pub use authorize::{AuthzError, Principal, authorize};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, Hs256TokenIssuer, JwtValidator, TokenIssueError, TokenIssuer};
pub use password::{MIN_PASSWORD_CHARS, PasswordError, check_password_policy, hash_password, verify_password};
pub use permissions::Permission;
pub use roles::{Role, role_permissions};
pub use user::{
    ActivateUser, ChangePassword, CreateUser, PasswordChanged, SuspendUser, User, UserActivated,
    UserCommand, UserCreated, UserEvent, UserStatus, UserSuspended,
};
