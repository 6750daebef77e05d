//! Bearer-token extractor guarding the ingestion hook.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};
use frontpage_core::store::MirrorStore;

use crate::{AppState, error::Error};

/// The shared secret the feed relay presents, stored only as a hash.
#[derive(Clone)]
pub struct AuthConfig {
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub secret_hash: String,
}

/// Zero-size marker: present in the handler means the request was authenticated.
pub struct HookAuthorized;

/// Verify `Authorization: Bearer <secret>` against the configured hash.
pub fn verify_bearer(headers: &HeaderMap, config: &AuthConfig) -> Result<(), Error> {
  let secret = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .ok_or(Error::Unauthorized)?;

  let parsed_hash = PasswordHash::new(&config.secret_hash).map_err(|_| Error::Unauthorized)?;

  Argon2::default()
    .verify_password(secret.as_bytes(), &parsed_hash)
    .map_err(|_| Error::Unauthorized)
}

impl<S> FromRequestParts<AppState<S>> for HookAuthorized
where
  S: MirrorStore + 'static,
{
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    verify_bearer(&parts.headers, &state.auth)?;
    Ok(HookAuthorized)
  }
}

#[cfg(test)]
mod tests {
  use argon2::{PasswordHasher, password_hash::SaltString};
  use axum::http::{HeaderValue, header};
  use rand_core::OsRng;

  use super::*;

  fn config(secret: &str) -> AuthConfig {
    let salt = SaltString::generate(&mut OsRng);
    let secret_hash = Argon2::default()
      .hash_password(secret.as_bytes(), &salt)
      .unwrap()
      .to_string();
    AuthConfig { secret_hash }
  }

  fn headers(value: &str) -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    h
  }

  #[test]
  fn correct_secret() {
    let cfg = config("hunter2");
    assert!(verify_bearer(&headers("Bearer hunter2"), &cfg).is_ok());
  }

  #[test]
  fn wrong_secret() {
    let cfg = config("hunter2");
    assert!(matches!(verify_bearer(&headers("Bearer hunter3"), &cfg), Err(Error::Unauthorized)));
  }

  #[test]
  fn missing_or_wrong_scheme() {
    let cfg = config("hunter2");
    assert!(verify_bearer(&HeaderMap::new(), &cfg).is_err());
    assert!(verify_bearer(&headers("Basic aHVudGVyMg=="), &cfg).is_err());
    assert!(verify_bearer(&headers("Bearer "), &cfg).is_err());
  }

  #[test]
  fn unparseable_hash_rejects_everything() {
    let cfg = AuthConfig { secret_hash: "plaintext".into() };
    assert!(verify_bearer(&headers("Bearer plaintext"), &cfg).is_err());
  }
}
