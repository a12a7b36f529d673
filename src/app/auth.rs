use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::{local, version4::V4, Local};
use sqlx::Row;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::app::error::ServiceError;
use crate::domain::user::{Actor, Role, User};
use crate::infra::db::Db;

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct AuthService {
    db: Db,
    access_key: [u8; 32],
    access_ttl_minutes: u64,
}

impl AuthService {
    pub fn new(db: Db, access_key: [u8; 32], access_ttl_minutes: u64) -> Self {
        Self {
            db,
            access_key,
            access_ttl_minutes,
        }
    }

    pub async fn register(
        &self,
        username: String,
        email: String,
        password: String,
    ) -> Result<(User, AccessToken), ServiceError> {
        let email_taken: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
                .bind(&email)
                .fetch_one(self.db.pool())
                .await?;
        if email_taken {
            return Err(ServiceError::conflict("email already registered"));
        }

        let username_taken: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
                .bind(&username)
                .fetch_one(self.db.pool())
                .await?;
        if username_taken {
            return Err(ServiceError::conflict("username already taken"));
        }

        let password_hash = hash_password(&password)?;
        let row = sqlx::query(
            "INSERT INTO users (username, email, password_hash) \
             VALUES ($1, $2, $3) \
             RETURNING id, username, email, role::text AS role, avatar_url, created_at",
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .fetch_one(self.db.pool())
        .await
        .map_err(|err| match &err {
            // two concurrent registrations can still trip the unique index
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                ServiceError::conflict("username or email already taken")
            }
            _ => ServiceError::Store(err),
        })?;

        let user = user_from_row(&row)?;
        let token = self.issue_access_token(user.id)?;
        Ok((user, token))
    }

    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<AccessToken>, ServiceError> {
        let row = sqlx::query("SELECT id, password_hash FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(self.db.pool())
            .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let user_id: Uuid = row.get("id");
        let password_hash: String = row.get("password_hash");
        if !verify_password(password, &password_hash)? {
            return Ok(None);
        }

        Ok(Some(self.issue_access_token(user_id)?))
    }

    /// Resolve a bearer token into the acting identity, or None when the
    /// token is malformed, expired, or its user no longer exists.
    pub async fn authenticate_access_token(
        &self,
        token: &str,
    ) -> Result<Option<Actor>, ServiceError> {
        let claims = match self.decrypt_claims(token)? {
            Some(claims) => claims,
            None => return Ok(None),
        };
        let user_id = match claim_uuid(&claims, "sub") {
            Some(user_id) => user_id,
            None => return Ok(None),
        };

        let row = sqlx::query("SELECT id, username, role::text AS role FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?;

        let actor = match row {
            Some(row) => {
                let role: String = row.get("role");
                let role = Role::from_db(&role)
                    .ok_or_else(|| ServiceError::Internal(anyhow::anyhow!("unknown role: {}", role)))?;
                Some(Actor {
                    id: row.get("id"),
                    username: row.get("username"),
                    role,
                })
            }
            None => None,
        };

        Ok(actor)
    }

    pub async fn get_current_user(&self, user_id: Uuid) -> Result<Option<User>, ServiceError> {
        let row = sqlx::query(
            "SELECT id, username, email, role::text AS role, avatar_url, created_at \
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        row.map(|row| user_from_row(&row)).transpose()
    }

    fn issue_access_token(&self, user_id: Uuid) -> Result<AccessToken, ServiceError> {
        let duration = std::time::Duration::from_secs(self.access_ttl_minutes * 60);
        let mut claims = Claims::new_expires_in(&duration).map_err(claims_error)?;
        claims.issuer("encre").map_err(claims_error)?;
        claims.audience("encre").map_err(claims_error)?;
        claims.subject(&user_id.to_string()).map_err(claims_error)?;
        claims.add_additional("typ", "access").map_err(claims_error)?;

        let key = SymmetricKey::<V4>::from(&self.access_key)
            .map_err(|err| anyhow::anyhow!("invalid access key: {}", err))?;
        let token = local::encrypt(&key, &claims, None, None)
            .map_err(|err| anyhow::anyhow!("failed to issue token: {}", err))?;
        let expires_at = OffsetDateTime::now_utc() + Duration::minutes(self.access_ttl_minutes as i64);

        Ok(AccessToken { token, expires_at })
    }

    fn decrypt_claims(&self, token: &str) -> Result<Option<Claims>, ServiceError> {
        let key = SymmetricKey::<V4>::from(&self.access_key)
            .map_err(|err| anyhow::anyhow!("invalid access key: {}", err))?;
        let mut rules = ClaimsValidationRules::new();
        rules.validate_issuer_with("encre");
        rules.validate_audience_with("encre");

        let untrusted = match UntrustedToken::<Local, V4>::try_from(token) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        let trusted = match local::decrypt(&key, &untrusted, &rules, None, None) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        Ok(trusted.payload_claims().cloned())
    }
}

pub(crate) fn user_from_row(row: &sqlx::postgres::PgRow) -> Result<User, ServiceError> {
    let role: String = row.get("role");
    let role = Role::from_db(&role)
        .ok_or_else(|| ServiceError::Internal(anyhow::anyhow!("unknown role: {}", role)))?;
    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        role,
        avatar_url: row.get("avatar_url"),
        created_at: row.get("created_at"),
    })
}

fn hash_password(password: &str) -> Result<String, anyhow::Error> {
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow::anyhow!("failed to hash password: {}", err))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> Result<bool, anyhow::Error> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| anyhow::anyhow!("invalid password hash: {}", err))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn claims_error(err: pasetors::errors::Error) -> ServiceError {
    ServiceError::Internal(anyhow::anyhow!("failed to build claims: {}", err))
}

fn claim_uuid(claims: &Claims, name: &str) -> Option<Uuid> {
    claims
        .get_claim(name)
        .and_then(|value| value.as_str())
        .and_then(|value| Uuid::parse_str(value).ok())
}
