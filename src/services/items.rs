//! Inventory item CRUD.
//!
//! Items carry three stock counters and a stored total. The invariant
//! `total == available + in_use + damaged` is validated on every write;
//! the counters are informational and never adjusted by the request
//! workflow.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::Set, Condition, QueryOrder, QuerySelect};
use serde::Deserialize;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::db::DbPool;
use crate::entities::item;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::Role;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateItemInput {
    #[validate(length(min = 1, max = 120, message = "Name must be 1-120 characters"))]
    pub name: String,
    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub level: Role,
    #[validate(range(min = 0, message = "Counters must be non-negative"))]
    pub available: i32,
    #[validate(range(min = 0, message = "Counters must be non-negative"))]
    pub in_use: i32,
    #[validate(range(min = 0, message = "Counters must be non-negative"))]
    pub damaged: i32,
    pub total: i32,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateItemInput {
    #[validate(length(min = 1, max = 120, message = "Name must be 1-120 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub level: Option<Role>,
    #[validate(range(min = 0, message = "Counters must be non-negative"))]
    pub available: Option<i32>,
    #[validate(range(min = 0, message = "Counters must be non-negative"))]
    pub in_use: Option<i32>,
    #[validate(range(min = 0, message = "Counters must be non-negative"))]
    pub damaged: Option<i32>,
    pub total: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ItemFilter {
    pub category: Option<String>,
    pub location: Option<String>,
    pub search: Option<String>,
}

/// Reject writes that would break the stored-total invariant.
fn check_total(available: i32, in_use: i32, damaged: i32, total: i32) -> Result<(), ServiceError> {
    let sum = available + in_use + damaged;
    if sum != total {
        return Err(ServiceError::ValidationError(format!(
            "Total must equal available + in use + damaged ({} != {})",
            total, sum
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct ItemService {
    db_pool: Arc<DbPool>,
    event_sender: Option<EventSender>,
}

impl ItemService {
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

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_item(&self, input: CreateItemInput) -> Result<item::Model, ServiceError> {
        input.validate()?;
        check_total(input.available, input.in_use, input.damaged, input.total)?;

        let now = Utc::now();
        let row = item::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            description: Set(input.description),
            category: Set(input.category),
            location: Set(input.location),
            level: Set(input.level.to_string()),
            available: Set(input.available),
            in_use: Set(input.in_use),
            damaged: Set(input.damaged),
            total: Set(input.total),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        };
        let created = row.insert(&*self.db_pool).await?;

        info!(item_id = %created.id, "item created");
        self.send_event(Event::ItemCreated(created.id)).await?;
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn get_item(&self, item_id: Uuid) -> Result<item::Model, ServiceError> {
        item::Entity::find_by_id(item_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", item_id)))
    }

    #[instrument(skip(self))]
    pub async fn list_items(
        &self,
        filter: ItemFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<item::Model>, u64), ServiceError> {
        let mut condition = Condition::all();
        if let Some(category) = &filter.category {
            condition = condition.add(item::Column::Category.eq(category.clone()));
        }
        if let Some(location) = &filter.location {
            condition = condition.add(item::Column::Location.eq(location.clone()));
        }
        if let Some(search) = &filter.search {
            condition = condition.add(item::Column::Name.contains(search.clone()));
        }

        let total = item::Entity::find()
            .filter(condition.clone())
            .count(&*self.db_pool)
            .await?;

        let rows = item::Entity::find()
            .filter(condition)
            .order_by_asc(item::Column::Name)
            .offset(page.saturating_sub(1) * per_page)
            .limit(per_page)
            .all(&*self.db_pool)
            .await?;

        Ok((rows, total))
    }

    /// Partial update. Counters are re-checked against the stored total
    /// using the merged values, so a single-counter edit cannot silently
    /// break the invariant.
    #[instrument(skip(self, input))]
    pub async fn update_item(
        &self,
        item_id: Uuid,
        input: UpdateItemInput,
    ) -> Result<item::Model, ServiceError> {
        input.validate()?;

        let existing = self.get_item(item_id).await?;
        let available = input.available.unwrap_or(existing.available);
        let in_use = input.in_use.unwrap_or(existing.in_use);
        let damaged = input.damaged.unwrap_or(existing.damaged);
        let total = input.total.unwrap_or(existing.total);
        check_total(available, in_use, damaged, total)?;

        let mut active: item::ActiveModel = existing.into();
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if input.description.is_some() {
            active.description = Set(input.description);
        }
        if input.category.is_some() {
            active.category = Set(input.category);
        }
        if input.location.is_some() {
            active.location = Set(input.location);
        }
        if let Some(level) = input.level {
            active.level = Set(level.to_string());
        }
        active.available = Set(available);
        active.in_use = Set(in_use);
        active.damaged = Set(damaged);
        active.total = Set(total);
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(&*self.db_pool).await?;
        info!(%item_id, "item updated");
        self.send_event(Event::ItemUpdated(item_id)).await?;
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete_item(&self, item_id: Uuid) -> Result<(), ServiceError> {
        let result = item::Entity::delete_by_id(item_id)
            .exec(&*self.db_pool)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Item {} not found", item_id)));
        }
        info!(%item_id, "item deleted");
        self.send_event(Event::ItemDeleted(item_id)).await?;
        Ok(())
    }

    /// Distinct category values for filter dropdowns.
    pub async fn list_categories(&self) -> Result<Vec<String>, ServiceError> {
        let rows: Vec<Option<String>> = item::Entity::find()
            .select_only()
            .column(item::Column::Category)
            .distinct()
            .into_tuple()
            .all(&*self.db_pool)
            .await?;
        let mut categories: Vec<String> = rows.into_iter().flatten().collect();
        categories.sort();
        Ok(categories)
    }

    /// Distinct location values for filter dropdowns.
    pub async fn list_locations(&self) -> Result<Vec<String>, ServiceError> {
        let rows: Vec<Option<String>> = item::Entity::find()
            .select_only()
            .column(item::Column::Location)
            .distinct()
            .into_tuple()
            .all(&*self.db_pool)
            .await?;
        let mut locations: Vec<String> = rows.into_iter().flatten().collect();
        locations.sort();
        Ok(locations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_must_match_counter_sum() {
        assert!(check_total(3, 2, 1, 6).is_ok());
        assert!(check_total(3, 2, 1, 5).is_err());
        assert!(check_total(0, 0, 0, 0).is_ok());
    }
}
