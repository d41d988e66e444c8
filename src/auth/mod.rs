//! Authentication module
//!
//! Extracts bearer tokens from request headers and validates them as JWTs.

use hyper::header::AUTHORIZATION;
use hyper::HeaderMap;
use thiserror::Error;
use uuid::Uuid;

pub mod jwt;

/// Authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingAuth,

    #[error("Malformed authorization header")]
    MalformedHeader,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Failed to sign token: {0}")]
    SigningError(String),
}

/// Authentication result
#[derive(Debug, Clone, PartialEq)]
pub struct AuthResult {
    pub user_id: Uuid,
}

/// Authenticator trait
pub trait Authenticator: Send + Sync {
    /// Authenticate a request from its headers
    fn authenticate(&self, headers: &HeaderMap) -> Result<AuthResult, AuthError>;
}

/// Extract the token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers.get(AUTHORIZATION).ok_or(AuthError::MissingAuth)?;
    let value = value.to_str().map_err(|_| AuthError::MalformedHeader)?;

    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or(AuthError::MalformedHeader)?;

    if token.is_empty() || token.contains(' ') {
        return Err(AuthError::MalformedHeader);
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_extracted() {
        let headers = headers_with("Bearer abc.def.ghi");
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_missing_header() {
        let headers = HeaderMap::new();
        assert!(matches!(bearer_token(&headers), Err(AuthError::MissingAuth)));
    }

    #[test]
    fn test_wrong_scheme() {
        let headers = headers_with("Basic dXNlcjpwYXNz");
        assert!(matches!(
            bearer_token(&headers),
            Err(AuthError::MalformedHeader)
        ));
    }

    #[test]
    fn test_empty_token() {
        let headers = headers_with("Bearer ");
        assert!(matches!(
            bearer_token(&headers),
            Err(AuthError::MalformedHeader)
        ));
    }
}
