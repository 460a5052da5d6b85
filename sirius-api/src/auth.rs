//! Authentication Module
//!
//! Bearer JWT validation for the role gate. A token carries the caller's
//! user id (`sub`) and a single role claim; the role is checked against the
//! allow-list by the catalog, not here.
//!
//! Time validation is done with an injected [`JwtClock`] instead of letting
//! `jsonwebtoken` read the system clock, so tests are deterministic.

use crate::error::{ApiError, ApiResult};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sirius_core::{ConfigError, Role, SiriusError, UserId};
use std::collections::HashSet;
use std::sync::Arc;

/// Placeholder secret used when `SIRIUS_JWT_SECRET` is unset.
pub const INSECURE_DEFAULT_SECRET: &str = "INSECURE_DEFAULT_SECRET_CHANGE_IN_PRODUCTION";

const MIN_PRODUCTION_SECRET_LEN: usize = 32;

// ============================================================================
// CLOCK ABSTRACTION
// ============================================================================

/// Clock abstraction for JWT time validation.
pub trait JwtClock: Send + Sync {
    /// Current time as Unix epoch seconds. Negative for pre-1970 clocks.
    fn now_epoch_secs(&self) -> i64;
}

/// Production clock using system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl JwtClock for SystemClock {
    fn now_epoch_secs(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Fixed clock for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl JwtClock for FixedClock {
    fn now_epoch_secs(&self) -> i64 {
        self.0
    }
}

/// Test clock helpers for common scenarios.
#[cfg(test)]
pub mod test_clocks {
    use super::FixedClock;

    /// 2024-01-01 00:00:00 UTC
    pub fn valid() -> FixedClock {
        FixedClock(1704067200)
    }

    /// 2020-01-01 00:00:00 UTC
    pub fn expired() -> FixedClock {
        FixedClock(1577836800)
    }

    /// 2030-01-01 00:00:00 UTC
    pub fn future() -> FixedClock {
        FixedClock(1893456000)
    }
}

// ============================================================================
// JWT SECRET
// ============================================================================

/// JWT signing secret that never appears in logs.
#[derive(Clone)]
pub struct JwtSecret(SecretString);

impl JwtSecret {
    /// # Errors
    /// Returns a config error if the secret is empty.
    pub fn new(secret: String) -> Result<Self, SiriusError> {
        if secret.trim().is_empty() {
            return Err(SiriusError::Config(ConfigError::MissingRequired {
                field: "SIRIUS_JWT_SECRET".to_string(),
            }));
        }
        Ok(Self(SecretString::new(secret.into())))
    }

    /// The placeholder used when no secret is configured.
    pub fn insecure_default() -> Self {
        Self(SecretString::new(INSECURE_DEFAULT_SECRET.into()))
    }

    /// Expose the secret value for signing and verification only.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn len(&self) -> usize {
        self.0.expose_secret().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }

    pub fn is_insecure_default(&self) -> bool {
        self.0.expose_secret() == INSECURE_DEFAULT_SECRET
    }
}

impl std::fmt::Debug for JwtSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JwtSecret([REDACTED, {} chars])", self.len())
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Authentication configuration.
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: JwtSecret,

    /// JWT algorithm (default: HS256)
    pub jwt_algorithm: Algorithm,

    /// Lifetime of issued tokens in seconds (default: 1 hour)
    pub jwt_expiration_secs: i64,

    /// Tolerated clock drift in seconds (default: 60)
    pub jwt_clock_skew_secs: i64,

    /// Deployment environment name, lowercased
    pub environment: String,

    /// Clock for JWT time validation
    pub clock: Arc<dyn JwtClock>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret)
            .field("jwt_algorithm", &self.jwt_algorithm)
            .field("jwt_expiration_secs", &self.jwt_expiration_secs)
            .field("jwt_clock_skew_secs", &self.jwt_clock_skew_secs)
            .field("environment", &self.environment)
            .field("clock", &"<JwtClock>")
            .finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: JwtSecret::insecure_default(),
            jwt_algorithm: Algorithm::HS256,
            jwt_expiration_secs: 3600,
            jwt_clock_skew_secs: 60,
            environment: "development".to_string(),
            clock: Arc::new(SystemClock),
        }
    }
}

impl AuthConfig {
    /// Load from the process environment.
    ///
    /// # Environment Variables
    /// - `SIRIUS_JWT_SECRET`: signing secret
    /// - `SIRIUS_JWT_EXPIRATION_SECS`: token lifetime (default: 3600)
    /// - `SIRIUS_JWT_CLOCK_SKEW_SECS`: clock skew tolerance (default: 60)
    /// - `SIRIUS_ENVIRONMENT`: `development` | `production` (default: development)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let jwt_secret = lookup("SIRIUS_JWT_SECRET")
            .and_then(|s| JwtSecret::new(s).ok())
            .unwrap_or_else(JwtSecret::insecure_default);

        Self {
            jwt_secret,
            jwt_expiration_secs: lookup("SIRIUS_JWT_EXPIRATION_SECS")
                .and_then(|s| s.trim().parse().ok())
                .filter(|secs: &i64| *secs > 0)
                .unwrap_or(defaults.jwt_expiration_secs),
            jwt_clock_skew_secs: lookup("SIRIUS_JWT_CLOCK_SKEW_SECS")
                .and_then(|s| s.trim().parse().ok())
                .filter(|secs: &i64| *secs >= 0)
                .unwrap_or(defaults.jwt_clock_skew_secs),
            environment: lookup("SIRIUS_ENVIRONMENT")
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.environment),
            ..defaults
        }
    }

    pub fn with_secret(mut self, secret: JwtSecret) -> Self {
        self.jwt_secret = secret;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn JwtClock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn is_production(&self) -> bool {
        matches!(self.environment.as_str(), "production" | "prod")
    }

    /// Refuse insecure secrets in production. Development only warns.
    pub fn validate_for_production(&self) -> ApiResult<()> {
        let production = self.is_production();

        if self.jwt_secret.is_insecure_default() {
            if production {
                return Err(ApiError::invalid_input(format!(
                    "Cannot start in production with the default JWT secret. \
                     Set SIRIUS_JWT_SECRET. SIRIUS_ENVIRONMENT={}",
                    self.environment
                )));
            }
            tracing::warn!(
                "Using the default JWT secret. Set SIRIUS_JWT_SECRET before deploying."
            );
        } else if self.jwt_secret.len() < MIN_PRODUCTION_SECRET_LEN {
            if production {
                return Err(ApiError::invalid_input(format!(
                    "JWT secret is too short for production use ({} chars, need {}).",
                    self.jwt_secret.len(),
                    MIN_PRODUCTION_SECRET_LEN
                )));
            }
            tracing::warn!(
                secret_len = self.jwt_secret.len(),
                "JWT secret is shorter than {} characters",
                MIN_PRODUCTION_SECRET_LEN
            );
        }

        Ok(())
    }
}

// ============================================================================
// JWT CLAIMS
// ============================================================================

/// JWT claims carried by a bearer token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Role claim, canonical value or ASCII alias
    pub role: String,
}

impl Claims {
    pub fn new(user_id: UserId, role: Role, expiration_secs: i64, clock: &dyn JwtClock) -> Self {
        let now = clock.now_epoch_secs();
        Self {
            sub: user_id.to_string(),
            iat: now,
            exp: now + expiration_secs,
            role: role.as_str().to_string(),
        }
    }

    pub fn is_expired(&self, clock: &dyn JwtClock) -> bool {
        self.exp < clock.now_epoch_secs()
    }

    pub fn user_id(&self) -> ApiResult<UserId> {
        self.sub
            .parse::<UserId>()
            .map_err(|_| ApiError::invalid_token("Token subject is not a user id"))
    }

    /// A role outside the closed set makes the whole token invalid.
    pub fn role(&self) -> ApiResult<Role> {
        self.role
            .parse::<Role>()
            .map_err(|e| ApiError::invalid_token(e.to_string()))
    }
}

// ============================================================================
// AUTHENTICATION CONTEXT
// ============================================================================

/// Identity attached to an authenticated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: UserId,
    pub role: Role,
}

impl AuthContext {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }
}

// ============================================================================
// AUTHENTICATION FUNCTIONS
// ============================================================================

fn validate_claim_times(now: i64, exp: i64, leeway_secs: i64) -> ApiResult<()> {
    if exp < now - leeway_secs {
        return Err(ApiError::token_expired());
    }
    Ok(())
}

/// Verify a token's signature and expiry and return its claims.
pub fn validate_jwt_token(config: &AuthConfig, token: &str) -> ApiResult<Claims> {
    let decoding_key = DecodingKey::from_secret(config.jwt_secret.expose().as_bytes());

    // Signature only; time is checked against the injected clock below.
    let mut validation = Validation::new(config.jwt_algorithm);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.required_spec_claims = HashSet::from(["exp".to_string()]);

    let token_data =
        decode::<Claims>(token, &decoding_key, &validation).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::InvalidToken => {
                ApiError::invalid_token("Token is invalid")
            }
            jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                ApiError::invalid_token("Token signature is invalid")
            }
            _ => ApiError::invalid_token(format!("Token validation failed: {}", e)),
        })?;

    let claims = token_data.claims;
    let now = config.clock.now_epoch_secs();
    if now < 0 {
        tracing::error!(
            timestamp = now,
            "System clock returned pre-epoch time - server time is broken"
        );
        return Err(ApiError::internal_error("Server time configuration error"));
    }

    validate_claim_times(now, claims.exp, config.jwt_clock_skew_secs)?;
    Ok(claims)
}

/// Issue a token for `user_id` with `role`. Used by tooling and tests.
pub fn generate_jwt_token(config: &AuthConfig, user_id: UserId, role: Role) -> ApiResult<String> {
    let claims = Claims::new(user_id, role, config.jwt_expiration_secs, &*config.clock);
    let encoding_key = EncodingKey::from_secret(config.jwt_secret.expose().as_bytes());
    let header = Header::new(config.jwt_algorithm);

    encode(&header, &claims, &encoding_key)
        .map_err(|e| ApiError::internal_error(format!("Failed to generate token: {}", e)))
}

/// Authenticate an `Authorization` header value.
pub fn authenticate_bearer(config: &AuthConfig, header_value: &str) -> ApiResult<AuthContext> {
    let token = header_value
        .strip_prefix("Bearer ")
        .or_else(|| header_value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Expected 'Authorization: Bearer <token>'"))?;

    let claims = validate_jwt_token(config, token)?;
    Ok(AuthContext::new(claims.user_id()?, claims.role()?))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::collections::HashMap;

    fn test_config() -> ApiResult<AuthConfig> {
        let secret = JwtSecret::new("test_secret_key_that_is_long_enough_for_hs256".into())
            .map_err(ApiError::from)?;
        Ok(AuthConfig::default()
            .with_secret(secret)
            .with_clock(Arc::new(test_clocks::valid())))
    }

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_jwt_generation_and_validation() -> ApiResult<()> {
        let config = test_config()?;
        let token = generate_jwt_token(&config, UserId::new(7), Role::Staff)?;

        let claims = validate_jwt_token(&config, &token)?;
        assert_eq!(claims.sub, "7");
        assert_eq!(claims.role()?, Role::Staff);
        assert_eq!(claims.exp - claims.iat, 3600);
        Ok(())
    }

    #[test]
    fn test_authenticate_bearer() -> ApiResult<()> {
        let config = test_config()?;
        let token = generate_jwt_token(&config, UserId::new(3), Role::Administrator)?;

        let ctx = authenticate_bearer(&config, &format!("Bearer {}", token))?;
        assert_eq!(ctx, AuthContext::new(UserId::new(3), Role::Administrator));
        Ok(())
    }

    #[test]
    fn test_authenticate_bearer_rejects_other_schemes() -> ApiResult<()> {
        let config = test_config()?;
        let err = authenticate_bearer(&config, "Basic dXNlcjpwYXNz").err();
        assert_eq!(err.map(|e| e.code), Some(ErrorCode::Unauthorized));
        Ok(())
    }

    #[test]
    fn test_wrong_secret_rejected() -> ApiResult<()> {
        let config = test_config()?;
        let token = generate_jwt_token(&config, UserId::new(1), Role::User)?;

        let other = AuthConfig::default()
            .with_secret(JwtSecret::new("a_completely_different_secret_value_here".into())
                .map_err(ApiError::from)?)
            .with_clock(Arc::new(test_clocks::valid()));
        let err = validate_jwt_token(&other, &token).err();
        assert_eq!(err.map(|e| e.code), Some(ErrorCode::InvalidToken));
        Ok(())
    }

    #[test]
    fn test_expired_token() -> ApiResult<()> {
        let issuing = test_config()?.with_clock(Arc::new(test_clocks::expired()));
        let token = generate_jwt_token(&issuing, UserId::new(1), Role::User)?;

        let validating = test_config()?.with_clock(Arc::new(test_clocks::future()));
        let err = validate_jwt_token(&validating, &token).err();
        assert_eq!(err.map(|e| e.code), Some(ErrorCode::TokenExpired));
        Ok(())
    }

    #[test]
    fn test_clock_skew_tolerance() -> ApiResult<()> {
        let config = test_config()?;
        let token = generate_jwt_token(&config, UserId::new(1), Role::User)?;

        // 30 seconds past expiry, inside the 60 second skew.
        let late = test_config()?.with_clock(Arc::new(FixedClock(
            test_clocks::valid().0 + config.jwt_expiration_secs + 30,
        )));
        assert!(validate_jwt_token(&late, &token).is_ok());

        let too_late = test_config()?.with_clock(Arc::new(FixedClock(
            test_clocks::valid().0 + config.jwt_expiration_secs + 61,
        )));
        assert!(validate_jwt_token(&too_late, &token).is_err());
        Ok(())
    }

    #[test]
    fn test_unknown_role_claim_rejected() -> ApiResult<()> {
        let config = test_config()?;
        let mut claims = Claims::new(UserId::new(1), Role::User, 3600, &test_clocks::valid());
        claims.role = "Повар".to_string();
        let token = encode(
            &Header::new(config.jwt_algorithm),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret.expose().as_bytes()),
        )
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

        let err = authenticate_bearer(&config, &format!("Bearer {}", token)).err();
        assert_eq!(err.map(|e| e.code), Some(ErrorCode::InvalidToken));
        Ok(())
    }

    #[test]
    fn test_role_alias_accepted() -> ApiResult<()> {
        let mut claims = Claims::new(UserId::new(1), Role::User, 3600, &test_clocks::valid());
        claims.role = "staff".to_string();
        assert_eq!(claims.role()?, Role::Staff);
        Ok(())
    }

    #[test]
    fn test_pre_epoch_clock_fails_loud() -> ApiResult<()> {
        let config = test_config()?;
        let token = generate_jwt_token(&config, UserId::new(1), Role::User)?;

        let broken = test_config()?.with_clock(Arc::new(FixedClock(-1)));
        let err = validate_jwt_token(&broken, &token).err();
        assert_eq!(err.map(|e| e.code), Some(ErrorCode::InternalError));
        Ok(())
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = AuthConfig::from_lookup(lookup(&[]));
        assert!(config.jwt_secret.is_insecure_default());
        assert_eq!(config.jwt_expiration_secs, 3600);
        assert_eq!(config.jwt_clock_skew_secs, 60);
        assert!(!config.is_production());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = AuthConfig::from_lookup(lookup(&[
            ("SIRIUS_JWT_SECRET", "s3cret"),
            ("SIRIUS_JWT_EXPIRATION_SECS", "120"),
            ("SIRIUS_JWT_CLOCK_SKEW_SECS", "bogus"),
            ("SIRIUS_ENVIRONMENT", "Production"),
        ]));
        assert_eq!(config.jwt_secret.expose(), "s3cret");
        assert_eq!(config.jwt_expiration_secs, 120);
        assert_eq!(config.jwt_clock_skew_secs, 60);
        assert!(config.is_production());
    }

    #[test]
    fn test_production_validation_rejects_insecure_default() {
        let config = AuthConfig::from_lookup(lookup(&[("SIRIUS_ENVIRONMENT", "production")]));
        assert!(config.validate_for_production().is_err());
    }

    #[test]
    fn test_production_validation_rejects_short_secret() {
        let config = AuthConfig::from_lookup(lookup(&[
            ("SIRIUS_ENVIRONMENT", "production"),
            ("SIRIUS_JWT_SECRET", "short"),
        ]));
        assert!(config.validate_for_production().is_err());
    }

    #[test]
    fn test_production_validation_allows_secure_secret() {
        let config = AuthConfig::from_lookup(lookup(&[
            ("SIRIUS_ENVIRONMENT", "production"),
            ("SIRIUS_JWT_SECRET", "this_is_a_secure_secret_with_at_least_32_chars"),
        ]));
        assert!(config.validate_for_production().is_ok());
    }

    #[test]
    fn test_development_allows_default_secret() {
        let config = AuthConfig::from_lookup(lookup(&[("SIRIUS_ENVIRONMENT", "development")]));
        assert!(config.validate_for_production().is_ok());
    }

    #[test]
    fn test_secret_is_redacted() -> ApiResult<()> {
        let config = test_config()?;
        let debug = format!("{:?}", config);
        assert!(!debug.contains("test_secret_key"));
        assert!(debug.contains("REDACTED"));
        Ok(())
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(JwtSecret::new(String::new()).is_err());
        assert!(JwtSecret::new("   ".to_string()).is_err());
    }
}
