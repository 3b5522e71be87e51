/*!
 * # Authentication and Authorization Module
 *
 * Bearer JWT authentication for the back-office API.
 *
 * - Tokens are HS256 JWTs whose subject is the account id.
 * - On every request the account is reloaded, so deactivation takes effect
 *   immediately and the stored permission snapshot is what gets checked.
 * - Routes declare a permission or a role list through [`AuthRouterExt`].
 */

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::entities::user::{self, Entity as UserEntity, PermissionSet};

pub mod password;
pub mod permissions;
pub mod rbac;

pub use permissions::*;
pub use rbac::*;

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,  // Subject (user ID)
    pub role: String, // Role at issue time, informational only
    pub jti: String,  // JWT ID
    pub iat: i64,     // Issued at time
    pub exp: i64,     // Expiration time
    pub iss: String,  // Issuer
}

/// Authenticated caller, resolved from the token and the stored account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub permissions: PermissionSet,
}

impl AuthUser {
    /// Check if user has a specific role
    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }

    /// Check if the stored permission set contains `permission`
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

impl From<user::Model> for AuthUser {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
            role: model.role,
            permissions: model.permissions,
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingAuth)
    }
}

/// JWT settings
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub access_token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(jwt_secret: String, jwt_issuer: String, access_token_expiration: Duration) -> Self {
        Self {
            jwt_secret,
            jwt_issuer,
            access_token_expiration,
        }
    }
}

impl From<&AppConfig> for AuthConfig {
    fn from(config: &AppConfig) -> Self {
        Self::new(
            config.jwt_secret.clone(),
            config.auth_issuer.clone(),
            Duration::from_secs(config.jwt_expiration),
        )
    }
}

/// Issued access token
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Lifetime in seconds
    pub expires_in: i64,
}

/// Token issuing and request authentication
#[derive(Clone)]
pub struct AuthService {
    pub config: AuthConfig,
    db: Arc<DatabaseConnection>,
}

impl AuthService {
    pub fn new(config: AuthConfig, db: Arc<DatabaseConnection>) -> Self {
        Self { config, db }
    }

    /// Issue an access token for `account`.
    pub fn issue_token(&self, account: &user::Model) -> Result<TokenResponse, AuthError> {
        let now = Utc::now();
        let expires = now
            + ChronoDuration::from_std(self.config.access_token_expiration)
                .map_err(|_| AuthError::InternalError("Invalid token duration".to_string()))?;

        let claims = Claims {
            sub: account.id.to_string(),
            role: account.role.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: expires.timestamp(),
            iss: self.config.jwt_issuer.clone(),
        };

        let access_token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))?;

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.access_token_expiration.as_secs() as i64,
        })
    }

    /// Validate a JWT and extract its claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })
    }

    /// Resolve a bearer token to the stored account it names.
    pub async fn authenticate(&self, token: &str) -> Result<AuthUser, AuthError> {
        let claims = self.validate_token(token)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        let account = UserEntity::find_by_id(user_id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?
            .ok_or(AuthError::InvalidToken)?;

        if !account.is_active {
            debug!(%user_id, "token presented for deactivated account");
            return Err(AuthError::AccountDisabled);
        }

        Ok(AuthUser::from(account))
    }

    /// Check credentials, stamp the last login and issue a token.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(TokenResponse, user::Model), AuthError> {
        let account = UserEntity::find()
            .filter(user::Column::Email.eq(email.trim().to_lowercase()))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?
            .ok_or(AuthError::InvalidCredentials)?;

        let matches = password::verify_password(password, &account.password_hash)
            .map_err(|e| AuthError::InternalError(e.to_string()))?;
        if !matches {
            warn!(user_id = %account.id, "failed login attempt");
            return Err(AuthError::InvalidCredentials);
        }

        if !account.is_active {
            return Err(AuthError::AccountDisabled);
        }

        let mut active: user::ActiveModel = account.into();
        active.last_login = Set(Some(Utc::now()));
        let account = active
            .update(self.db.as_ref())
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        let token = self.issue_token(&account)?;
        info!(user_id = %account.id, role = %account.role, "user logged in");
        Ok((token, account))
    }
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Account is deactivated")]
    AccountDisabled,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingAuth
            | Self::InvalidCredentials
            | Self::InvalidToken
            | Self::TokenExpired
            | Self::AccountDisabled => StatusCode::UNAUTHORIZED,
            Self::InsufficientPermissions => StatusCode::FORBIDDEN,
            Self::TokenCreation(_) | Self::DatabaseError(_) | Self::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (error_code, error_message): (&str, String) = match &self {
            Self::MissingAuth => ("AUTH_MISSING", "Authentication required".to_string()),
            Self::InvalidCredentials => {
                ("AUTH_INVALID_CREDENTIALS", "Invalid credentials".to_string())
            }
            Self::InvalidToken => (
                "AUTH_INVALID_TOKEN",
                "Invalid authentication token".to_string(),
            ),
            Self::TokenExpired => ("AUTH_TOKEN_EXPIRED", "Token has expired".to_string()),
            Self::AccountDisabled => {
                ("AUTH_ACCOUNT_DISABLED", "Account is deactivated".to_string())
            }
            Self::InsufficientPermissions => (
                "AUTH_INSUFFICIENT_PERMISSIONS",
                "Insufficient permissions".to_string(),
            ),
            Self::TokenCreation(_) | Self::DatabaseError(_) | Self::InternalError(_) => {
                tracing::error!(error = %self, "authentication failure");
                ("AUTH_INTERNAL_ERROR", "Internal server error".to_string())
            }
        };

        let body = Json(serde_json::json!({
            "error": {
                "code": error_code,
                "message": error_message,
            }
        }));

        (status, body).into_response()
    }
}

/// Check the authenticated caller against a route requirement
pub async fn access_middleware(
    State(requirement): State<AccessRequirement>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AuthError::MissingAuth)?;

    authorize(user, &requirement)?;

    Ok(next.run(request).await)
}

/// Authentication middleware that resolves the bearer token to an [`AuthUser`]
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Authentication service not available",
            )
                .into_response();
        }
    };

    let token = match bearer_token(request.headers()) {
        Some(token) => token.to_string(),
        None => return AuthError::MissingAuth.into_response(),
    };

    match auth_service.authenticate(&token).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_permission(self, permission: &str) -> Self;
    fn with_any_permission(self, permissions: &[&str]) -> Self;
    fn with_any_role(self, roles: &[Role]) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.route_layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_permission(self, permission: &str) -> Self {
        self.route_layer(axum::middleware::from_fn_with_state(
            AccessRequirement::Permission(permission.to_string()),
            access_middleware,
        ))
        .with_auth()
    }

    fn with_any_permission(self, permissions: &[&str]) -> Self {
        self.route_layer(axum::middleware::from_fn_with_state(
            AccessRequirement::AnyPermission(
                permissions.iter().map(ToString::to_string).collect(),
            ),
            access_middleware,
        ))
        .with_auth()
    }

    fn with_any_role(self, roles: &[Role]) -> Self {
        self.route_layer(axum::middleware::from_fn_with_state(
            AccessRequirement::AnyRole(roles.to_vec()),
            access_middleware,
        ))
        .with_auth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn service() -> AuthService {
        AuthService::new(
            AuthConfig::new(
                "test_secret_key_for_unit_tests_only_0123456789".to_string(),
                "agency-backoffice".to_string(),
                Duration::from_secs(3600),
            ),
            Arc::new(DatabaseConnection::Disconnected),
        )
    }

    fn account(role: Role) -> user::Model {
        let now = Utc::now();
        user::Model {
            id: Uuid::new_v4(),
            name: "Ada".to_string(),
            email: "ada@agency.test".to_string(),
            password_hash: String::new(),
            role,
            permissions: PermissionSet::default(),
            is_active: true,
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn issued_token_round_trips_subject_and_role() {
        let svc = service();
        let account = account(Role::Cashier);
        let token = svc.issue_token(&account).unwrap();
        assert_eq!(token.token_type, "Bearer");
        assert_eq!(token.expires_in, 3600);

        let claims = svc.validate_token(&token.access_token).unwrap();
        assert_eq!(claims.sub, account.id.to_string());
        assert_eq!(claims.role, "cashier");
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let mut other = service();
        other.config.jwt_secret = "a_completely_different_secret_value_987654321".to_string();
        let token = other.issue_token(&account(Role::Staff)).unwrap();

        assert!(matches!(
            service().validate_token(&token.access_token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn token_from_other_issuer_is_rejected() {
        let mut other = service();
        other.config.jwt_issuer = "someone-else".to_string();
        let token = other.issue_token(&account(Role::Staff)).unwrap();

        assert!(service().validate_token(&token.access_token).is_err());
    }

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));
    }

    #[test]
    fn auth_error_status_mapping() {
        assert_eq!(AuthError::MissingAuth.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AuthError::AccountDisabled.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::InsufficientPermissions.status_code(),
            StatusCode::FORBIDDEN
        );
    }
}
