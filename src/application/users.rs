use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use thiserror::Error;

use crate::application::repos::{RepoError, UsersRepo};
use crate::domain::entities::UserRecord;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum UserError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("username must not be empty")]
    EmptyUsername,
    #[error("password must be at least {} characters", MIN_PASSWORD_LEN)]
    WeakPassword,
    #[error("failed to hash password: {0}")]
    Hash(String),
}

/// Credential checks for write access.
#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn UsersRepo>,
}

impl UserService {
    pub fn new(repo: Arc<dyn UsersRepo>) -> Self {
        Self { repo }
    }

    pub async fn add_user(&self, username: &str, password: &str) -> Result<UserRecord, UserError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(UserError::EmptyUsername);
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(UserError::WeakPassword);
        }

        let password = password.to_string();
        let hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|err| UserError::Hash(err.to_string()))??;
        let record = self.repo.create_user(username, &hash).await?;
        Ok(record)
    }

    /// True when `username` exists and `password` matches its stored hash.
    ///
    /// Store failures and unreadable hashes deny access.
    pub async fn verify(&self, username: &str, password: &str) -> bool {
        let record = match self.repo.find_user(username).await {
            Ok(Some(record)) => record,
            Ok(None) => return false,
            Err(err) => {
                tracing::warn!(
                    target = "catalog::auth",
                    error = %err,
                    "credential lookup failed"
                );
                return false;
            }
        };

        let password = password.to_string();
        let outcome = tokio::task::spawn_blocking(move || {
            verify_password(&password, &record.password_hash)
        })
        .await;

        match outcome {
            Ok(Ok(matches)) => matches,
            Ok(Err(err)) => {
                tracing::warn!(
                    target = "catalog::auth",
                    username,
                    error = %err,
                    "stored password hash is unreadable"
                );
                false
            }
            Err(err) => {
                tracing::warn!(
                    target = "catalog::auth",
                    error = %err,
                    "password verification task failed"
                );
                false
            }
        }
    }
}

fn hash_password(password: &str) -> Result<String, UserError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| UserError::Hash(err.to_string()))
}

fn verify_password(password: &str, phc: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed = PasswordHash::new(phc)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use time::OffsetDateTime;

    use super::*;

    #[derive(Default)]
    struct InMemoryUsers {
        users: Mutex<Vec<UserRecord>>,
    }

    #[async_trait]
    impl UsersRepo for InMemoryUsers {
        async fn find_user(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
            let users = self.users.lock().unwrap();
            Ok(users.iter().find(|user| user.username == username).cloned())
        }

        async fn create_user(
            &self,
            username: &str,
            password_hash: &str,
        ) -> Result<UserRecord, RepoError> {
            let mut users = self.users.lock().unwrap();
            let record = UserRecord {
                id: users.len() as i32 + 1,
                username: username.to_string(),
                password_hash: password_hash.to_string(),
                created_at: OffsetDateTime::now_utc(),
            };
            users.push(record.clone());
            Ok(record)
        }
    }

    #[tokio::test]
    async fn added_user_verifies_with_the_same_password_only() {
        let service = UserService::new(Arc::new(InMemoryUsers::default()));
        let record = service
            .add_user("  admin ", "correct horse")
            .await
            .expect("add user");
        assert_eq!(record.username, "admin");
        assert!(record.password_hash.starts_with("$argon2id$"));
        assert!(!record.password_hash.contains("correct horse"));

        assert!(service.verify("admin", "correct horse").await);
        assert!(!service.verify("admin", "correct horse ").await);
        assert!(!service.verify("nobody", "correct horse").await);
    }

    #[tokio::test]
    async fn equal_passwords_hash_differently_per_user() {
        let service = UserService::new(Arc::new(InMemoryUsers::default()));
        let a = service.add_user("a", "same-password").await.unwrap();
        let b = service.add_user("b", "same-password").await.unwrap();
        assert_ne!(a.password_hash, b.password_hash);
    }

    #[tokio::test]
    async fn unreadable_stored_hash_denies_access() {
        let repo = Arc::new(InMemoryUsers::default());
        repo.create_user("legacy", "not-a-phc-string").await.unwrap();
        let service = UserService::new(repo);

        assert!(!service.verify("legacy", "not-a-phc-string").await);
    }

    #[tokio::test]
    async fn rejects_blank_usernames_and_short_passwords() {
        let service = UserService::new(Arc::new(InMemoryUsers::default()));
        assert!(matches!(
            service.add_user(" ", "long enough").await,
            Err(UserError::EmptyUsername)
        ));
        assert!(matches!(
            service.add_user("bob", "short").await,
            Err(UserError::WeakPassword)
        ));
    }
}
