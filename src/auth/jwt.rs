//! JWT Authentication
//!
//! HS256 access tokens signed with the shared secret from configuration.
//! The `sub` claim carries the user id.

use super::{bearer_token, AuthError, AuthResult, Authenticator};
use chrono::{Duration, Utc};
use hyper::HeaderMap;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT Claims
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// JWT Authenticator
///
/// # Example
///
/// ```
/// use tubely::auth::jwt::JwtAuthenticator;
///
/// let auth = JwtAuthenticator::new_hs256("my-secret", "tubely-access");
/// ```
pub struct JwtAuthenticator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtAuthenticator {
    /// Create a new JWT authenticator with a secret key (HS256)
    pub fn new_hs256(secret: &str, issuer: &str) -> Self {
        let decoding_key = DecodingKey::from_secret(secret.as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_aud = false;
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        Self {
            decoding_key,
            validation,
        }
    }

    /// Validate a raw token and return the user id it was issued for
    pub fn validate(&self, token: &str) -> Result<Uuid, AuthError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::InvalidToken(e.to_string()),
            },
        )?;

        Uuid::parse_str(&token_data.claims.sub)
            .map_err(|_| AuthError::InvalidToken("subject is not a valid user id".into()))
    }
}

impl Authenticator for JwtAuthenticator {
    fn authenticate(&self, headers: &HeaderMap) -> Result<AuthResult, AuthError> {
        let token = bearer_token(headers)?;
        let user_id = self.validate(token)?;

        tracing::debug!(user_id = %user_id, "JWT authentication successful");

        Ok(AuthResult { user_id })
    }
}

/// Signs access tokens accepted by [`JwtAuthenticator`]
pub struct JwtIssuer {
    encoding_key: EncodingKey,
    issuer: String,
}

impl JwtIssuer {
    pub fn new_hs256(secret: &str, issuer: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.to_string(),
        }
    }

    /// Issue a token for `user_id` that expires after `expires_in`
    pub fn issue(&self, user_id: Uuid, expires_in: Duration) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            iss: self.issuer.clone(),
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::SigningError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_then_validate() {
        let user_id = Uuid::new_v4();
        let issuer = JwtIssuer::new_hs256("secret", "tubely-access");
        let token = issuer.issue(user_id, Duration::hours(1)).unwrap();

        let auth = JwtAuthenticator::new_hs256("secret", "tubely-access");
        assert_eq!(auth.validate(&token).unwrap(), user_id);
    }

    #[test]
    fn test_missing_token() {
        let auth = JwtAuthenticator::new_hs256("secret", "tubely-access");
        let result = auth.authenticate(&HeaderMap::new());
        assert!(matches!(result, Err(AuthError::MissingAuth)));
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let token = JwtIssuer::new_hs256("secret", "someone-else")
            .issue(Uuid::new_v4(), Duration::hours(1))
            .unwrap();

        let auth = JwtAuthenticator::new_hs256("secret", "tubely-access");
        assert!(matches!(
            auth.validate(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }
}
