//! Password hashes, session tokens and invitation codes.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken as jwt;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};

use crate::models::User;
use crate::{Error, Result};

pub const INVITATION_CODE_LEN : usize = 20;
pub const SESSION_DAYS : u64 = 30;

const SALT_LEN : usize = 16;

fn argon2_config() -> argon2::Config<'static> {
    argon2::Config {
        variant : argon2::Variant::Argon2id,
        ..Default::default()
    }
}

/// Argon2id in PHC string form. Hashing is slow on purpose, so it runs
/// outside the async worker.
pub fn hash_password(password : &str) -> Result<String> {
    let mut salt = [0u8; SALT_LEN];
    thread_rng().fill(&mut salt);

    let hash = tokio::task::block_in_place(|| {
        argon2::hash_encoded(password.as_bytes(), &salt, &argon2_config())
    })?;

    Ok(hash)
}

pub fn verify_password(hash : &str, password : &str) -> Result<bool> {
    let ok = tokio::task::block_in_place(|| {
        argon2::verify_encoded(hash, password.as_bytes())
    })?;

    Ok(ok)
}

pub fn random_code(len : usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Claims carried by the session cookie. Bumping a user's
/// `token_version` invalidates every token issued before.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub iss : String,
    pub aud : String,
    pub sub : String,
    pub ver : u32,
    pub iat : u64,
    pub exp : u64,
}

impl Token {
    pub fn session_lifetime() -> Duration {
        Duration::from_secs(SESSION_DAYS * 24 * 60 * 60)
    }

    pub fn for_user(user : &User, server_name : &str, lifetime : Duration) -> Result<Self> {
        let iat = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        let exp = iat
            .checked_add(lifetime.as_secs())
            .ok_or(Error::TokenDurationTooBig)?;

        Ok(Token {
            iss : server_name.to_string(),
            aud : server_name.to_string(),
            sub : user.id.to_string(),
            ver : user.token_version,
            iat,
            exp,
        })
    }

    pub fn user_id(&self) -> Option<u32> {
        self.sub.parse().ok()
    }

    /// Whether this token still speaks for `user`.
    pub fn matches(&self, user : &User) -> bool {
        self.user_id() == Some(user.id) && self.ver == user.token_version
    }

    pub fn encode(&self, secret : &[u8]) -> Result<String> {
        let tok = jwt::encode(
            &jwt::Header::default(),
            self,
            &jwt::EncodingKey::from_secret(secret),
        )
        .map_err(|err| err.into_kind())?;

        Ok(tok)
    }

    /// Checks signature, expiry, issuer and audience.
    pub fn decode(token : &str, secret : &[u8], server_name : &str) -> Result<Self> {
        let mut validation = jwt::Validation {
            iss : Some(server_name.to_string()),
            ..Default::default()
        };
        validation.set_audience(&[server_name]);

        let data = jwt::decode::<Token>(
            token,
            &jwt::DecodingKey::from_secret(secret),
            &validation,
        )
        .map_err(|err| err.into_kind())?;

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id :            7,
            name :          "alice".into(),
            email :         "alice@example.com".into(),
            password :      String::new(),
            token_version : 2,
            created :       crate::models::Time::now(),
        }
    }

    fn session(name : &str) -> Token {
        Token::for_user(&user(), name, Token::session_lifetime()).unwrap()
    }

    #[test]
    fn session_roundtrip() {
        let s = session("bookmarks.test").encode(b"secret").unwrap();

        let tok = Token::decode(&s, b"secret", "bookmarks.test").unwrap();
        assert_eq!(tok.user_id(), Some(7));
        assert_eq!(tok.exp - tok.iat, SESSION_DAYS * 24 * 60 * 60);
        assert!(tok.matches(&user()));
    }

    #[test]
    fn stale_version_does_not_match() {
        let tok = session("bookmarks.test");

        let mut bumped = user();
        bumped.token_version += 1;
        assert!(!tok.matches(&bumped));
    }

    #[test]
    fn wrong_secret_issuer_or_audience() {
        let s = session("bookmarks.test").encode(b"secret").unwrap();

        assert!(Token::decode(&s, b"other", "bookmarks.test").is_err());
        assert!(Token::decode(&s, b"secret", "elsewhere").is_err());

        let mut tok = session("bookmarks.test");
        tok.aud = "elsewhere".into();
        let s = tok.encode(b"secret").unwrap();
        assert!(Token::decode(&s, b"secret", "bookmarks.test").is_err());
    }

    #[test]
    fn expired() {
        let mut tok = session("bookmarks.test");
        tok.iat -= 7200;
        tok.exp = tok.iat + 60;

        let s = tok.encode(b"secret").unwrap();
        assert!(Token::decode(&s, b"secret", "bookmarks.test").is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn passwords() {
        let hash = hash_password("hunter2").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password(&hash, "hunter2").unwrap());
        assert!(!verify_password(&hash, "hunter3").unwrap());
        assert_ne!(hash, hash_password("hunter2").unwrap());
    }

    #[test]
    fn codes() {
        let a = random_code(INVITATION_CODE_LEN);
        let b = random_code(INVITATION_CODE_LEN);

        assert_eq!(a.len(), INVITATION_CODE_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
