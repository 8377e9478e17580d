//! Authentication middleware.
//!
//! Reads are open to anonymous callers; writes need either a configured
//! bearer token or HTTP Basic credentials of a configured user. Credentials
//! that are present but wrong are rejected on every method.

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::error::AppError;
use super::state::AppState;
use crate::config::AuthSettings;

/// Paths that never require credentials.
const PUBLIC_PATHS: &[&str] = &["/health"];

/// Authenticated caller, available to handlers as an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    Token,
    User(String),
}

impl Principal {
    pub fn name(&self) -> &str {
        match self {
            Principal::Token => "token",
            Principal::User(name) => name,
        }
    }
}

/// Credentials found in an `Authorization` header.
#[derive(Debug, PartialEq, Eq)]
enum Credentials {
    Bearer(String),
    Basic { user: String, password: String },
    Malformed,
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    if PUBLIC_PATHS.contains(&req.uri().path()) {
        return next.run(req).await;
    }

    match extract_credentials(req.headers()) {
        Some(credentials) => match authenticate(&state.config.auth, credentials) {
            Ok(principal) => {
                tracing::debug!(user = principal.name(), "authenticated request");
                req.extensions_mut().insert(principal);
                next.run(req).await
            }
            Err(message) => AppError::Unauthorized(message.to_string()).into_response(),
        },
        None if is_safe(req.method()) => next.run(req).await,
        None => AppError::Unauthorized("Authentication credentials were not provided.".into())
            .into_response(),
    }
}

fn is_safe(method: &Method) -> bool {
    [Method::GET, Method::HEAD, Method::OPTIONS].contains(method)
}

/// `None` when no header is present or its scheme is not one we handle.
fn extract_credentials(headers: &HeaderMap) -> Option<Credentials> {
    let value = headers.get(header::AUTHORIZATION)?;
    let Ok(value) = value.to_str() else {
        return Some(Credentials::Malformed);
    };
    let (scheme, rest) = value.trim().split_once(' ').unwrap_or((value.trim(), ""));
    let rest = rest.trim();

    if scheme.eq_ignore_ascii_case("bearer") {
        if rest.is_empty() || rest.contains(' ') {
            return Some(Credentials::Malformed);
        }
        return Some(Credentials::Bearer(rest.to_string()));
    }
    if scheme.eq_ignore_ascii_case("basic") {
        return Some(decode_basic(rest).unwrap_or(Credentials::Malformed));
    }
    None
}

fn decode_basic(encoded: &str) -> Option<Credentials> {
    let bytes = STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(bytes).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some(Credentials::Basic {
        user: user.to_string(),
        password: password.to_string(),
    })
}

fn authenticate(auth: &AuthSettings, credentials: Credentials) -> Result<Principal, &'static str> {
    match credentials {
        Credentials::Bearer(token) if auth.accepts_token(&token) => Ok(Principal::Token),
        Credentials::Bearer(_) => Err("Invalid token."),
        Credentials::Basic { user, password } if auth.verify_user(&user, &password) => {
            Ok(Principal::User(user))
        }
        Credentials::Basic { .. } => Err("Invalid username/password."),
        Credentials::Malformed => Err("Invalid authorization header."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn settings() -> AuthSettings {
        let mut auth = AuthSettings::default();
        auth.tokens.push("abc123".to_string());
        auth.users.insert("admin".to_string(), light_hash("pa:ss"));
        auth
    }

    /// Argon2id hash with minimal cost parameters, cheap enough for tests.
    fn light_hash(password: &str) -> String {
        use argon2::password_hash::{PasswordHasher, SaltString};
        use argon2::{Algorithm, Argon2, Params, Version};

        let params = Params::new(Params::MIN_M_COST, 1, 1, None).unwrap();
        let salt = SaltString::encode_b64(b"configdb-salt").unwrap();
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
            .hash_password(password.as_bytes(), &salt)
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_bearer_token() {
        let credentials = extract_credentials(&headers("Bearer abc123")).unwrap();
        assert_eq!(authenticate(&settings(), credentials), Ok(Principal::Token));

        let credentials = extract_credentials(&headers("Bearer nope")).unwrap();
        assert!(authenticate(&settings(), credentials).is_err());
    }

    #[test]
    fn test_basic_credentials_allow_colon_in_password() {
        let encoded = STANDARD.encode("admin:pa:ss");
        let credentials = extract_credentials(&headers(&format!("Basic {}", encoded))).unwrap();
        assert_eq!(
            authenticate(&settings(), credentials),
            Ok(Principal::User("admin".to_string()))
        );

        let encoded = STANDARD.encode("admin:pa:sx");
        let credentials = extract_credentials(&headers(&format!("Basic {}", encoded))).unwrap();
        assert!(authenticate(&settings(), credentials).is_err());

        let encoded = STANDARD.encode("nobody:pa:ss");
        let credentials = extract_credentials(&headers(&format!("Basic {}", encoded))).unwrap();
        assert!(authenticate(&settings(), credentials).is_err());
    }

    #[test]
    fn test_malformed_headers() {
        assert_eq!(
            extract_credentials(&headers("Basic !!!")),
            Some(Credentials::Malformed)
        );
        assert_eq!(
            extract_credentials(&headers("Bearer")),
            Some(Credentials::Malformed)
        );
        assert_eq!(extract_credentials(&headers("Digest xyz")), None);
        assert_eq!(extract_credentials(&HeaderMap::new()), None);
    }

    #[test]
    fn test_safe_methods() {
        assert!(is_safe(&Method::GET));
        assert!(is_safe(&Method::OPTIONS));
        assert!(!is_safe(&Method::PATCH));
    }
}
