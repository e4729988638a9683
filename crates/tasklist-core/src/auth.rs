//! Password accounts and JWT session tokens.
//!
//! Accounts are stored in the platform database. Passwords are salted and
//! hashed with blake3. A successful sign-in issues an HS256 JWT carrying:
//!
//! - `sub`: user id
//! - `email`: account email
//! - `iat` / `exp`: issue and expiry timestamps (Unix seconds)
//! - `iss`: always [`TOKEN_ISSUER`]
//!
//! A forgotten password is recovered with a single-use code: the code is
//! handed to the caller for delivery, only its blake3 hash is stored, and
//! exchanging it signs the account in so the password can be replaced.

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sled::{Db, Tree};
use uuid::Uuid;

use tasklist_proto::UserId;

use crate::config::PlatformConfig;
use crate::error::{AuthError, AuthResult};
use crate::session::Session;

/// Issuer claim stamped on every token.
pub const TOKEN_ISSUER: &str = "tasklist-auth";

/// Tree name for user rows keyed by user id.
const USERS_TREE: &str = "auth:users";

/// Tree name for the email -> user id index.
const EMAILS_TREE: &str = "auth:emails";

/// Tree name for pending recovery codes keyed by code hash.
const RECOVERY_TREE: &str = "auth:recovery";

/// Public view of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredUser {
    id: UserId,
    email: String,
    created_at: DateTime<Utc>,
    salt: String,
    password_hash: String,
}

impl StoredUser {
    fn public(&self) -> User {
        User {
            id: self.id,
            email: self.email.clone(),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RecoveryRecord {
    user_id: UserId,
    expires_at: DateTime<Utc>,
}

/// Session token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// Account registry and token issuer.
pub struct Authenticator {
    users: Tree,
    emails: Tree,
    recovery: Tree,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    config: PlatformConfig,
}

impl Authenticator {
    /// Open the account trees in `db`.
    pub fn open(db: &Db, config: &PlatformConfig) -> AuthResult<Self> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[TOKEN_ISSUER]);
        validation.leeway = config.token_leeway_secs;

        Ok(Self {
            users: db.open_tree(USERS_TREE)?,
            emails: db.open_tree(EMAILS_TREE)?,
            recovery: db.open_tree(RECOVERY_TREE)?,
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            config: config.clone(),
        })
    }

    /// Register a new account and return a session for it.
    pub fn sign_up(&self, email: &str, password: &str) -> AuthResult<Session> {
        let email = normalize_email(email)?;
        self.check_password(password)?;

        let salt = generate_salt();
        let user = StoredUser {
            id: UserId::new(),
            email: email.clone(),
            created_at: Utc::now(),
            password_hash: hash_password(&salt, password),
            salt,
        };

        // Reserve the email atomically so concurrent sign-ups cannot both win.
        let reserved = self
            .emails
            .compare_and_swap(email.as_bytes(), None as Option<&[u8]>, Some(&user.id.as_bytes()[..]))?;
        if reserved.is_err() {
            return Err(AuthError::EmailTaken(email));
        }
        self.users.insert(user.id.as_bytes(), serde_json::to_vec(&user)?)?;

        tracing::info!(user_id = %user.id, "user signed up");
        self.issue(&user)
    }

    /// Verify credentials and issue a session.
    pub fn sign_in_with_password(&self, email: &str, password: &str) -> AuthResult<Session> {
        let email = normalize_email(email).map_err(|_| AuthError::InvalidCredentials)?;
        let user = self
            .find_by_email(&email)?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(&user.salt, password, &user.password_hash) {
            tracing::debug!(user_id = %user.id, "password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        tracing::debug!(user_id = %user.id, "user signed in");
        self.issue(&user)
    }

    /// Replace the password of `user_id`.
    pub fn update_password(&self, user_id: UserId, new_password: &str) -> AuthResult<()> {
        self.check_password(new_password)?;
        let mut user = self
            .load(user_id)?
            .ok_or_else(|| AuthError::UnknownUser(user_id.to_string()))?;

        user.salt = generate_salt();
        user.password_hash = hash_password(&user.salt, new_password);
        self.users.insert(user.id.as_bytes(), serde_json::to_vec(&user)?)?;

        tracing::info!(user_id = %user_id, "password updated");
        Ok(())
    }

    /// Start password recovery for `email`.
    ///
    /// Returns the recovery code to deliver, or `None` if no account uses
    /// this email. Earlier codes for the account stay valid until used or
    /// expired.
    pub fn request_password_reset(&self, email: &str) -> AuthResult<Option<String>> {
        let email = normalize_email(email)?;
        let Some(user) = self.find_by_email(&email)? else {
            tracing::debug!("password recovery requested for unknown email");
            return Ok(None);
        };

        let mut code = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut code);
        let code = hex::encode(code);

        let ttl = chrono::Duration::from_std(self.config.recovery_ttl)
            .unwrap_or_else(|_| chrono::Duration::hours(1));
        let record = RecoveryRecord {
            user_id: user.id,
            expires_at: Utc::now() + ttl,
        };
        self.recovery
            .insert(recovery_key(&code).as_bytes(), serde_json::to_vec(&record)?)?;

        tracing::info!(user_id = %user.id, expires_at = %record.expires_at, "password recovery started");
        Ok(Some(code))
    }

    /// Consume a recovery code and sign its account in.
    pub fn exchange_recovery_code(&self, code: &str) -> AuthResult<Session> {
        let record: RecoveryRecord = match self.recovery.remove(recovery_key(code).as_bytes())? {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            None => return Err(AuthError::InvalidRecoveryCode),
        };
        if record.expires_at <= Utc::now() {
            tracing::debug!(user_id = %record.user_id, "expired recovery code");
            return Err(AuthError::InvalidRecoveryCode);
        }

        let user = self
            .load(record.user_id)?
            .ok_or(AuthError::InvalidRecoveryCode)?;
        tracing::info!(user_id = %user.id, "recovery code exchanged");
        self.issue(&user)
    }

    /// Look up an account.
    pub fn user(&self, user_id: UserId) -> AuthResult<Option<User>> {
        Ok(self.load(user_id)?.map(|u| u.public()))
    }

    /// Validate a token and return the session it describes.
    pub fn verify(&self, token: &str) -> AuthResult<Session> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        let claims = data.claims;

        let user_id: UserId = claims
            .sub
            .parse()
            .map_err(|_| AuthError::UnknownUser(claims.sub.clone()))?;
        if self.load(user_id)?.is_none() {
            return Err(AuthError::UnknownUser(claims.sub));
        }

        Ok(Session {
            user_id,
            email: claims.email,
            access_token: token.to_string(),
            expires_at: timestamp(claims.exp),
        })
    }

    fn issue(&self, user: &StoredUser) -> AuthResult<Session> {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(self.config.session_ttl)
            .unwrap_or_else(|_| chrono::Duration::hours(1));
        let expires_at = now + ttl;

        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: TOKEN_ISSUER.to_string(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;

        Ok(Session {
            user_id: user.id,
            email: user.email.clone(),
            access_token: token,
            expires_at: timestamp(claims.exp),
        })
    }

    fn check_password(&self, password: &str) -> AuthResult<()> {
        if password.chars().count() < self.config.min_password_length {
            return Err(AuthError::WeakPassword {
                min_length: self.config.min_password_length,
            });
        }
        Ok(())
    }

    fn find_by_email(&self, email: &str) -> AuthResult<Option<StoredUser>> {
        match self.emails.get(email.as_bytes())? {
            Some(id) => {
                let uuid = Uuid::from_slice(&id)
                    .map_err(|err| AuthError::Corrupt(format!("email index for {email}: {err}")))?;
                self.load(UserId::from_uuid(uuid))
            }
            None => Ok(None),
        }
    }

    fn load(&self, user_id: UserId) -> AuthResult<Option<StoredUser>> {
        match self.users.get(user_id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now)
}

fn normalize_email(email: &str) -> AuthResult<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AuthError::InvalidEmail(email)),
    }
}

fn recovery_key(code: &str) -> blake3::Hash {
    blake3::hash(code.trim().as_bytes())
}

fn generate_salt() -> String {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    hex::encode(salt)
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hasher.finalize().to_hex().to_string()
}

fn verify_password(salt: &str, password: &str, expected_hex: &str) -> bool {
    let mut hasher = blake3::Hasher::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    match blake3::Hash::from_hex(expected_hex) {
        // blake3::Hash equality is constant time.
        Ok(expected) => hasher.finalize() == expected,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn authenticator(config: PlatformConfig) -> Authenticator {
        let db = config.to_sled_config().open().unwrap();
        Authenticator::open(&db, &config).unwrap()
    }

    #[test]
    fn test_sign_up_and_sign_in() {
        let auth = authenticator(PlatformConfig::temporary());

        let session = auth.sign_up("Alice@Example.com ", "hunter22").unwrap();
        assert_eq!(session.email, "alice@example.com");

        let again = auth
            .sign_in_with_password("alice@example.com", "hunter22")
            .unwrap();
        assert_eq!(again.user_id, session.user_id);

        let verified = auth.verify(&again.access_token).unwrap();
        assert_eq!(verified.user_id, session.user_id);
        assert_eq!(verified.email, "alice@example.com");
    }

    #[test]
    fn test_corrupt_email_index_is_an_error() {
        let auth = authenticator(PlatformConfig::temporary());
        auth.emails
            .insert("eve@example.com", &[1u8, 2, 3][..])
            .unwrap();

        let err = auth
            .sign_in_with_password("eve@example.com", "whatever")
            .unwrap_err();
        assert!(matches!(err, AuthError::Corrupt(_)));
    }

    #[test]
    fn test_recovery_code_signs_in_once() {
        let auth = authenticator(PlatformConfig::temporary());
        let created = auth.sign_up("dana@example.com", "forgotten").unwrap();

        let code = auth
            .request_password_reset("Dana@Example.com")
            .unwrap()
            .unwrap();
        let session = auth.exchange_recovery_code(&code).unwrap();
        assert_eq!(session.user_id, created.user_id);

        auth.update_password(session.user_id, "remembered").unwrap();
        auth.sign_in_with_password("dana@example.com", "remembered")
            .unwrap();

        let err = auth.exchange_recovery_code(&code).unwrap_err();
        assert!(matches!(err, AuthError::InvalidRecoveryCode));
    }

    #[test]
    fn test_recovery_for_unknown_email() {
        let auth = authenticator(PlatformConfig::temporary());
        assert!(auth
            .request_password_reset("nobody@example.com")
            .unwrap()
            .is_none());
        assert!(matches!(
            auth.exchange_recovery_code("deadbeef").unwrap_err(),
            AuthError::InvalidRecoveryCode
        ));
    }

    #[test]
    fn test_expired_recovery_code() {
        let auth = authenticator(PlatformConfig::temporary().with_recovery_ttl(Duration::ZERO));
        auth.sign_up("frank@example.com", "password1").unwrap();

        let code = auth
            .request_password_reset("frank@example.com")
            .unwrap()
            .unwrap();
        assert!(matches!(
            auth.exchange_recovery_code(&code).unwrap_err(),
            AuthError::InvalidRecoveryCode
        ));
    }

    #[test]
    fn test_wrong_password() {
        let auth = authenticator(PlatformConfig::temporary());
        auth.sign_up("bob@example.com", "correct horse").unwrap();

        let err = auth
            .sign_in_with_password("bob@example.com", "battery staple")
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        let err = auth
            .sign_in_with_password("nobody@example.com", "whatever")
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[test]
    fn test_duplicate_email() {
        let auth = authenticator(PlatformConfig::temporary());
        auth.sign_up("carol@example.com", "password1").unwrap();

        let err = auth.sign_up("CAROL@example.com", "password2").unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken(email) if email == "carol@example.com"));
    }

    #[test]
    fn test_sign_up_validation() {
        let auth = authenticator(PlatformConfig::temporary());
        assert!(matches!(
            auth.sign_up("not-an-email", "password1").unwrap_err(),
            AuthError::InvalidEmail(_)
        ));
        assert!(matches!(
            auth.sign_up("dave@example.com", "123").unwrap_err(),
            AuthError::WeakPassword { min_length: 6 }
        ));
    }

    #[test]
    fn test_update_password() {
        let auth = authenticator(PlatformConfig::temporary());
        let session = auth.sign_up("erin@example.com", "first-pass").unwrap();

        auth.update_password(session.user_id, "second-pass").unwrap();

        assert!(auth
            .sign_in_with_password("erin@example.com", "first-pass")
            .is_err());
        assert!(auth
            .sign_in_with_password("erin@example.com", "second-pass")
            .is_ok());
    }

    #[test]
    fn test_expired_token_rejected() {
        let auth = authenticator(
            PlatformConfig::temporary().with_session_ttl(Duration::from_secs(0)),
        );
        let session = auth.sign_up("frank@example.com", "password1").unwrap();

        std::thread::sleep(Duration::from_millis(1100));
        assert!(matches!(
            auth.verify(&session.access_token).unwrap_err(),
            AuthError::Token(_)
        ));
    }

    #[test]
    fn test_token_from_other_secret_rejected() {
        let ours = authenticator(PlatformConfig::temporary().with_jwt_secret("ours"));
        let theirs = authenticator(PlatformConfig::temporary().with_jwt_secret("theirs"));

        let session = theirs.sign_up("grace@example.com", "password1").unwrap();
        assert!(ours.verify(&session.access_token).is_err());
    }
}
