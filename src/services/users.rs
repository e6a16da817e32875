//! User account administration.
//!
//! Identity lives in signed JWTs issued by the identity provider; these
//! rows carry the role assignment and profile fields the workflow reads.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::Set, QueryOrder};
use serde::Deserialize;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::db::DbPool;
use crate::entities::user;
use crate::errors::ServiceError;
use crate::models::Role;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateUserInput {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(max = 120, message = "Name must be at most 120 characters"))]
    pub name: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateUserInput {
    #[validate(length(max = 120, message = "Name must be at most 120 characters"))]
    pub name: Option<String>,
    pub role: Option<Role>,
}

#[derive(Clone)]
pub struct UserService {
    db_pool: Arc<DbPool>,
}

impl UserService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn create_user(&self, input: CreateUserInput) -> Result<user::Model, ServiceError> {
        input.validate()?;

        if self.find_by_email(&input.email).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "A user with email {} already exists",
                input.email
            )));
        }

        let now = Utc::now();
        let row = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(input.email),
            name: Set(input.name),
            role: Set(input.role.to_string()),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        };
        let created = row.insert(&*self.db_pool).await?;
        info!(user_id = %created.id, "user created");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, user_id: Uuid) -> Result<user::Model, ServiceError> {
        user::Entity::find_by_id(user_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<user::Model>, ServiceError> {
        let row = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(&*self.db_pool)
            .await?;
        Ok(row)
    }

    #[instrument(skip(self))]
    pub async fn list_users(&self) -> Result<Vec<user::Model>, ServiceError> {
        let rows = user::Entity::find()
            .order_by_asc(user::Column::Email)
            .all(&*self.db_pool)
            .await?;
        Ok(rows)
    }

    #[instrument(skip(self, input))]
    pub async fn update_user(
        &self,
        user_id: Uuid,
        input: UpdateUserInput,
    ) -> Result<user::Model, ServiceError> {
        input.validate()?;

        let existing = self.get_user(user_id).await?;
        let mut active: user::ActiveModel = existing.into();
        if input.name.is_some() {
            active.name = Set(input.name);
        }
        if let Some(role) = input.role {
            active.role = Set(role.to_string());
        }
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(&*self.db_pool).await?;
        info!(%user_id, "user updated");
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete_user(&self, user_id: Uuid) -> Result<(), ServiceError> {
        let result = user::Entity::delete_by_id(user_id)
            .exec(&*self.db_pool)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("User {} not found", user_id)));
        }
        info!(%user_id, "user deleted");
        Ok(())
    }
}
