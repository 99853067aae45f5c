//! Identity store - user records and verification flags
//!
//! Holds user accounts consumed by the order core to resolve buyer and
//! seller identity. Credentials, token issuance, and email/SMS delivery
//! live with the external authentication and notification collaborators.

use crate::error::MarketError;
use crate::models::User;
use crate::MarketResult;
use chrono::Utc;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// User registration request
#[derive(Debug, Clone)]
pub struct RegisterUserRequest {
    pub email: String,
    pub phone: Option<String>,
    pub name: String,
    pub is_seller: bool,
}

/// In-memory identity store (a database in production)
#[derive(Default)]
pub struct IdentityStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl IdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new user account
    pub async fn register_user(&self, request: RegisterUserRequest) -> MarketResult<User> {
        if request.email.trim().is_empty() {
            return Err(MarketError::validation("Email cannot be empty"));
        }
        if request.name.trim().is_empty() {
            return Err(MarketError::validation("Name cannot be empty"));
        }

        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == request.email) {
            return Err(MarketError::conflict(format!(
                "Email {} is already registered",
                request.email
            )));
        }

        let user = User::new(request.email, request.phone, request.name, request.is_seller);
        users.insert(user.id, user.clone());

        info!("Registered user: {}", user.id);

        Ok(user)
    }

    /// Get a user by ID
    pub async fn get_user(&self, user_id: Uuid) -> MarketResult<User> {
        self.users
            .read()
            .await
            .get(&user_id)
            .cloned()
            .ok_or_else(|| MarketError::not_found(format!("User {} not found", user_id)))
    }

    /// Mark a user's email as verified
    pub async fn mark_email_verified(&self, user_id: Uuid) -> MarketResult<User> {
        self.update_user(user_id, |user| user.email_verified = true)
            .await
    }

    /// Mark a user's phone as verified
    pub async fn mark_phone_verified(&self, user_id: Uuid) -> MarketResult<User> {
        self.update_user(user_id, |user| user.phone_verified = true)
            .await
    }

    /// Deactivate a user account
    pub async fn deactivate_user(&self, user_id: Uuid) -> MarketResult<User> {
        self.update_user(user_id, |user| user.is_active = false)
            .await
    }

    async fn update_user<F>(&self, user_id: Uuid, mutate: F) -> MarketResult<User>
    where
        F: FnOnce(&mut User),
    {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&user_id)
            .ok_or_else(|| MarketError::not_found(format!("User {} not found", user_id)))?;

        mutate(user);
        user.updated_at = Utc::now();

        Ok(user.clone())
    }
}
