use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

use crate::model::{Claims, LoginResponse};
use crate::AuthError;

/// Signs and verifies HS256 access tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expire_secs: u64,
}

impl TokenIssuer {
    pub fn new(secret: &str, expire_secs: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            expire_secs,
        }
    }

    pub fn issue(&self, sub: &str, name: &str, roles: Vec<String>) -> Result<LoginResponse, AuthError> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: sub.to_string(),
            name: name.to_string(),
            roles,
            iat: now,
            exp: now + self.expire_secs as i64,
        };
        let access_token =
            encode(&Header::default(), &claims, &self.encoding).map_err(|e| AuthError::Token(e.to_string()))?;
        Ok(LoginResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.expire_secs,
        })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| AuthError::Token(e.to_string()))
    }
}
