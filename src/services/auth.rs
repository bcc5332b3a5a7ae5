use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::models::{Role, User, UserId};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Password hashing and HS256 token issuing.
#[derive(Clone)]
pub struct AuthService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl: Duration,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(secret: &str, token_ttl_hours: i64, bcrypt_cost: u32) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            token_ttl: Duration::hours(token_ttl_hours),
            bcrypt_cost,
        }
    }

    pub fn hash_password(&self, password: &str) -> Result<String, bcrypt::BcryptError> {
        bcrypt::hash(password, self.bcrypt_cost)
    }

    pub fn verify_password(&self, password: &str, hash: &str) -> bool {
        bcrypt::verify(password, hash).unwrap_or(false)
    }

    pub fn issue_token(&self, user_id: &UserId, role: Role) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.as_str().to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + self.token_ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::default())?;
        Ok(data.claims)
    }

    /// Seconds until a freshly issued token expires.
    pub fn token_ttl_seconds(&self) -> i64 {
        self.token_ttl.num_seconds()
    }
}

/// Creates the admin account named by `ADMIN_EMAIL` unless that email is
/// already registered. Returns whether a user was created.
pub fn ensure_admin(
    conn: &rusqlite::Connection,
    auth: &AuthService,
    email: &str,
    password: &str,
) -> anyhow::Result<bool> {
    let email = email.trim().to_lowercase();
    if queries::get_user_by_email(conn, &email)?.is_some() {
        return Ok(false);
    }

    let admin = User {
        id: UserId::generate(),
        name: "Administrator".to_string(),
        email,
        password_hash: auth.hash_password(password)?,
        role: Role::Admin,
        phone: None,
        artist: None,
        created_at: Utc::now().naive_utc(),
    };
    queries::create_user(conn, &admin)?;
    tracing::info!(user_id = %admin.id, email = %admin.email, "admin account seeded");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AuthService {
        AuthService::new("test-secret", 24, 4)
    }

    #[test]
    fn test_password_hashing() {
        let auth = service();
        let hash = auth.hash_password("correct horse").unwrap();
        assert!(auth.verify_password("correct horse", &hash));
        assert!(!auth.verify_password("wrong horse", &hash));
        assert!(!auth.verify_password("correct horse", "not-a-hash"));
    }

    #[test]
    fn test_token_round_trip() {
        let auth = service();
        let id = UserId::new("user-123");
        let token = auth.issue_token(&id, Role::Artist).unwrap();
        let claims = auth.verify_token(&token).unwrap();
        assert_eq!(claims.sub, "user-123");
        assert_eq!(claims.role, Role::Artist);
        assert_eq!(claims.exp - claims.iat, auth.token_ttl_seconds());
    }

    #[test]
    fn test_token_from_other_secret_rejected() {
        let token = AuthService::new("other-secret", 24, 4)
            .issue_token(&UserId::new("user-123"), Role::Admin)
            .unwrap();
        assert!(service().verify_token(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        // Beyond the default 60s leeway.
        let auth = AuthService::new("test-secret", -1, 4);
        let token = auth.issue_token(&UserId::new("user-123"), Role::Customer).unwrap();
        assert!(auth.verify_token(&token).is_err());
    }

    #[test]
    fn test_tampered_token_rejected() {
        let auth = service();
        let token = auth.issue_token(&UserId::new("user-123"), Role::Customer).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = AuthService::new("test-secret", 24, 4)
            .issue_token(&UserId::new("user-123"), Role::Admin)
            .unwrap();
        let forged_payload = forged.split('.').nth(1).unwrap().to_string();
        parts[1] = &forged_payload;
        let spliced = parts.join(".");
        assert!(auth.verify_token(&spliced).is_err());
    }

    #[test]
    fn test_ensure_admin_is_idempotent() {
        let conn = crate::db::init_db(":memory:").unwrap();
        let auth = service();
        assert!(ensure_admin(&conn, &auth, "Admin@Example.com", "admin-pass").unwrap());
        assert!(!ensure_admin(&conn, &auth, "admin@example.com", "other-pass").unwrap());

        let admin = queries::get_user_by_email(&conn, "admin@example.com").unwrap().unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert!(auth.verify_password("admin-pass", &admin.password_hash));
    }
}
