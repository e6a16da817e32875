//! Aggregate counts for the dashboard.

use std::sync::Arc;

use sea_orm::entity::prelude::*;
use serde::Serialize;
use tracing::instrument;
use utoipa::ToSchema;

use crate::db::DbPool;
use crate::entities::{guest, item, request, user};
use crate::errors::ServiceError;
use crate::models::RequestStatus;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DashboardStats {
    pub total_items: u64,
    pub total_users: u64,
    pub total_guests: u64,
    pub total_requests: u64,
    pub pending_requests: u64,
    pub approved_requests: u64,
    pub rejected_requests: u64,
    pub returned_requests: u64,
    pub unconfirmed_requests: u64,
    pub overdue_requests: u64,
}

#[derive(Clone)]
pub struct DashboardService {
    db_pool: Arc<DbPool>,
}

impl DashboardService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    async fn count_status(&self, status: RequestStatus) -> Result<u64, ServiceError> {
        let count = request::Entity::find()
            .filter(request::Column::Status.eq(status.to_string()))
            .count(&*self.db_pool)
            .await?;
        Ok(count)
    }

    #[instrument(skip(self))]
    pub async fn stats(&self) -> Result<DashboardStats, ServiceError> {
        let total_items = item::Entity::find().count(&*self.db_pool).await?;
        let total_users = user::Entity::find().count(&*self.db_pool).await?;
        let total_guests = guest::Entity::find().count(&*self.db_pool).await?;
        let total_requests = request::Entity::find().count(&*self.db_pool).await?;

        Ok(DashboardStats {
            total_items,
            total_users,
            total_guests,
            total_requests,
            pending_requests: self.count_status(RequestStatus::Pending).await?,
            approved_requests: self.count_status(RequestStatus::Approved).await?,
            rejected_requests: self.count_status(RequestStatus::Rejected).await?,
            returned_requests: self.count_status(RequestStatus::Returned).await?,
            unconfirmed_requests: self.count_status(RequestStatus::Unconfirmed).await?,
            overdue_requests: self.count_status(RequestStatus::Overdue).await?,
        })
    }
}
