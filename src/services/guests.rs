//! Guest identities and email confirmation.
//!
//! Guests submit requests without an account. Each submission upserts a
//! guest row keyed by email and mints a fresh confirmation token; only the
//! SHA-256 of the token is stored. Confirming with a valid, unexpired
//! token marks the guest verified and releases their unconfirmed requests
//! into the pending pool.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::db::DbPool;
use crate::entities::guest;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

const TOKEN_LENGTH: usize = 32;
const TOKEN_TTL_HOURS: i64 = 48;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct GuestContactInput {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, max = 80, message = "First name must be 1-80 characters"))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 80, message = "Last name must be 1-80 characters"))]
    pub last_name: Option<String>,
    #[validate(length(max = 40, message = "Phone must be at most 40 characters"))]
    pub phone: Option<String>,
}

/// A freshly upserted guest plus the plaintext confirmation token.
/// The token exists only in this value; the row keeps its hash.
pub struct GuestRegistration {
    pub guest: guest::Model,
    pub token: String,
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn mint_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

#[derive(Clone)]
pub struct GuestService {
    db_pool: Arc<DbPool>,
    event_sender: Option<EventSender>,
}

impl GuestService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    async fn send_event(&self, event: Event) -> Result<(), ServiceError> {
        if let Some(sender) = &self.event_sender {
            sender
                .send(event)
                .await
                .map_err(ServiceError::EventError)?;
        }
        Ok(())
    }

    /// Upsert a guest by email and mint a new confirmation token.
    ///
    /// A repeat submission refreshes the contact fields, replaces the
    /// stored token hash and resets the expiry window; older tokens stop
    /// working at that point.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register_guest(
        &self,
        input: GuestContactInput,
    ) -> Result<GuestRegistration, ServiceError> {
        input.validate()?;

        let token = mint_token();
        let token_hash = hash_token(&token);
        let now = Utc::now();
        let expires_at = now + Duration::hours(TOKEN_TTL_HOURS);

        let existing = guest::Entity::find()
            .filter(guest::Column::Email.eq(input.email.clone()))
            .one(&*self.db_pool)
            .await?;

        let guest = match existing {
            Some(row) => {
                let mut active: guest::ActiveModel = row.into();
                if input.first_name.is_some() {
                    active.first_name = Set(input.first_name);
                }
                if input.last_name.is_some() {
                    active.last_name = Set(input.last_name);
                }
                if input.phone.is_some() {
                    active.phone = Set(input.phone);
                }
                active.verification_token_hash = Set(Some(token_hash));
                active.expires_at = Set(Some(expires_at));
                active.update(&*self.db_pool).await?
            }
            None => {
                let row = guest::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    email: Set(input.email),
                    first_name: Set(input.first_name),
                    last_name: Set(input.last_name),
                    phone: Set(input.phone),
                    verified: Set(false),
                    verification_token_hash: Set(Some(token_hash)),
                    created_at: Set(now),
                    expires_at: Set(Some(expires_at)),
                };
                row.insert(&*self.db_pool).await?
            }
        };

        info!(guest_id = %guest.id, "guest registered");
        Ok(GuestRegistration { guest, token })
    }

    #[instrument(skip(self))]
    pub async fn get_guest(&self, guest_id: Uuid) -> Result<guest::Model, ServiceError> {
        guest::Entity::find_by_id(guest_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Guest {} not found", guest_id)))
    }

    /// Confirm a guest with the token from their email.
    ///
    /// Wrong and expired tokens fail the same way, so the endpoint does
    /// not reveal whether a token ever existed.
    #[instrument(skip(self, token))]
    pub async fn confirm_guest(
        &self,
        guest_id: Uuid,
        token: &str,
    ) -> Result<guest::Model, ServiceError> {
        let guest = self.get_guest(guest_id).await?;

        let stored = guest
            .verification_token_hash
            .as_deref()
            .ok_or_else(|| ServiceError::AuthError("Invalid confirmation token".to_string()))?;
        if stored != hash_token(token) {
            warn!(%guest_id, "guest confirmation with wrong token");
            return Err(ServiceError::AuthError(
                "Invalid confirmation token".to_string(),
            ));
        }
        if let Some(expires_at) = guest.expires_at {
            if expires_at < Utc::now() {
                return Err(ServiceError::AuthError(
                    "Invalid confirmation token".to_string(),
                ));
            }
        }

        let mut active: guest::ActiveModel = guest.into();
        active.verified = Set(true);
        active.verification_token_hash = Set(None);
        let confirmed = active.update(&*self.db_pool).await?;

        info!(%guest_id, "guest confirmed");
        self.send_event(Event::GuestConfirmed { guest_id }).await?;
        Ok(confirmed)
    }
}
