/// JWT Token Generation and Validation
///
/// Access tokens and first-login temp tokens share the signing key and issuer;
/// the `purpose` claim keeps them apart.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::claims::{Claims, TokenPurpose};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};
use crate::users::User;

fn sign(claims: &Claims, config: &JwtSettings) -> Result<String, AppError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
}

/// Generate a short-lived access token for a user
pub fn generate_access_token(user: &User, config: &JwtSettings) -> Result<String, AppError> {
    let claims = Claims::new(
        user.id,
        user.email.clone(),
        user.role,
        TokenPurpose::Access,
        config.access_token_expiry,
        config.issuer.clone(),
    );
    sign(&claims, config)
}

/// Generate the temp token returned by a login that must reset first
pub fn generate_temp_token(user: &User, config: &JwtSettings) -> Result<String, AppError> {
    let claims = Claims::new(
        user.id,
        user.email.clone(),
        user.role,
        TokenPurpose::PasswordReset,
        config.temp_token_expiry,
        config.issuer.clone(),
    );
    sign(&claims, config)
}

/// Validate a token and check it was issued for `purpose`
///
/// # Errors
/// Returns `TokenInvalid` if the token is malformed, expired, tampered with,
/// from another issuer, or issued for a different purpose
pub fn validate_token(
    token: &str,
    config: &JwtSettings,
    purpose: TokenPurpose,
) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::warn!("JWT validation error: {}", e);
        AppError::Auth(AuthError::TokenInvalid)
    })?;

    if claims.purpose != purpose {
        tracing::warn!(
            expected = ?purpose,
            actual = ?claims.purpose,
            "JWT presented for the wrong purpose"
        );
        return Err(AppError::Auth(AuthError::TokenInvalid));
    }

    Ok(claims)
}
