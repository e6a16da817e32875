//! Checkout request workflow.
//!
//! Requests are created by authenticated users or by guests, carry one or
//! more item lines, and move through a small guarded status machine.
//! User-created requests are auto-approved at creation when the requester's
//! role rank clears the access level of every requested item; guest
//! requests always start unconfirmed and only enter the reviewable pool
//! once the guest confirms by email token.
//!
//! Persistence is header-first: the request row is written, then its lines
//! one by one. A line failure surfaces as an error while the header row
//! remains, matching how partial submissions are shown to reviewers.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::Set, Condition, QueryOrder, QuerySelect, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::config::EmptyRequestPolicy;
use crate::db::DbPool;
use crate::entities::{item, request, request_item, user};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{RequestStatus, Role};
use crate::services::approval;

/// One requested line at creation time.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct RequestLineInput {
    pub item_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateRequestInput {
    #[validate]
    pub items: Vec<RequestLineInput>,
    #[validate(length(max = 1000, message = "Reason must be at most 1000 characters"))]
    pub reason: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateRequestInput {
    #[validate]
    pub items: Option<Vec<RequestLineInput>>,
    #[validate(length(max = 1000, message = "Reason must be at most 1000 characters"))]
    pub reason: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

/// Filters for the request listing endpoint.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub user_id: Option<Uuid>,
    pub guest_id: Option<Uuid>,
}

/// A request line joined with the item it points at.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RequestLineDetail {
    pub id: Uuid,
    pub item_id: Uuid,
    pub item_name: String,
    pub item_level: Role,
    pub quantity: i32,
    pub returned_quantity: Option<i32>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RequestDetail {
    #[serde(flatten)]
    pub request: request::Model,
    pub items: Vec<RequestLineDetail>,
}

fn parse_status(raw: &str) -> Result<RequestStatus, ServiceError> {
    RequestStatus::from_str(raw)
        .map_err(|_| ServiceError::InternalError(format!("Unknown request status: {}", raw)))
}

#[derive(Clone)]
pub struct RequestService {
    db_pool: Arc<DbPool>,
    event_sender: Option<EventSender>,
    empty_policy: EmptyRequestPolicy,
}

impl RequestService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Option<EventSender>,
        empty_policy: EmptyRequestPolicy,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            empty_policy,
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

    /// Resolve the requester's rank from the users table. The token only
    /// authenticates the principal; a user the service has never stored
    /// (or one with an unparseable role column) ranks as a guest.
    async fn requester_role(&self, user_id: Uuid) -> Result<Role, ServiceError> {
        let row = user::Entity::find_by_id(user_id).one(&*self.db_pool).await?;
        Ok(Role::requester_or_default(
            row.as_ref().map(|u| u.role.as_str()),
        ))
    }

    /// Load the referenced items and resolve their access levels.
    ///
    /// Every line must point at an existing item; item levels that fail to
    /// parse resolve to admin, so bad data tightens the gate instead of
    /// opening it.
    async fn resolve_lines(
        &self,
        lines: &[RequestLineInput],
    ) -> Result<Vec<(item::Model, Role)>, ServiceError> {
        let mut resolved = Vec::with_capacity(lines.len());
        for line in lines {
            let item = item::Entity::find_by_id(line.item_id)
                .one(&*self.db_pool)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Item {} not found", line.item_id))
                })?;
            let level = Role::item_level_or_closed(Some(&item.level));
            resolved.push((item, level));
        }
        Ok(resolved)
    }

    async fn insert_lines(
        &self,
        request_id: Uuid,
        lines: &[RequestLineInput],
    ) -> Result<(), ServiceError> {
        let now = Utc::now();
        for line in lines {
            let row = request_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                request_id: Set(request_id),
                item_id: Set(line.item_id),
                quantity: Set(line.quantity),
                returned_quantity: Set(None),
                created_at: Set(now),
            };
            row.insert(&*self.db_pool).await.map_err(|e| {
                warn!(%request_id, item_id = %line.item_id, error = %e, "request line insert failed");
                ServiceError::DatabaseError(e)
            })?;
        }
        Ok(())
    }

    /// Create a request for an authenticated user, auto-approving when the
    /// requester's rank clears every item's access level. The rank comes
    /// from the users table, not from the token's role claim.
    #[instrument(skip(self, input), fields(user_id = %user.user_id))]
    pub async fn create_request(
        &self,
        user: &AuthUser,
        input: CreateRequestInput,
    ) -> Result<RequestDetail, ServiceError> {
        input.validate()?;
        if input.items.is_empty() && self.empty_policy == EmptyRequestPolicy::Reject {
            return Err(ServiceError::ValidationError(
                "A request must include at least one item".to_string(),
            ));
        }

        let requester = self.requester_role(user.user_id).await?;
        let resolved = self.resolve_lines(&input.items).await?;
        let levels: Vec<Role> = resolved.iter().map(|(_, level)| *level).collect();
        let decision = approval::decide(requester, &levels);

        let now = Utc::now();
        let request_id = Uuid::new_v4();
        let header = request::ActiveModel {
            id: Set(request_id),
            user_id: Set(Some(user.user_id)),
            guest_id: Set(None),
            status: Set(decision.initial_status().to_string()),
            reason: Set(input.reason.clone()),
            due_date: Set(input.due_date),
            created_at: Set(now),
            reviewed_at: Set(decision.is_approved().then_some(now)),
            returned_at: Set(None),
        };
        header.insert(&*self.db_pool).await?;
        self.insert_lines(request_id, &input.items).await?;

        info!(
            %request_id,
            auto_approved = decision.is_approved(),
            lines = input.items.len(),
            "request created"
        );
        self.send_event(Event::RequestCreated {
            request_id,
            auto_approved: decision.is_approved(),
        })
        .await?;

        self.get_request(request_id).await
    }

    /// Create a request on behalf of a guest. Guest requests bypass the
    /// approval check entirely and start unconfirmed; they enter the
    /// pending pool via [`confirm_guest_request`](Self::confirm_guest_request).
    #[instrument(skip(self, input), fields(%guest_id))]
    pub async fn create_guest_request(
        &self,
        guest_id: Uuid,
        input: CreateRequestInput,
    ) -> Result<RequestDetail, ServiceError> {
        input.validate()?;
        if input.items.is_empty() {
            return Err(ServiceError::ValidationError(
                "Guest requests must include at least one item".to_string(),
            ));
        }

        // Items must exist even though no approval decision is made yet.
        self.resolve_lines(&input.items).await?;

        let now = Utc::now();
        let request_id = Uuid::new_v4();
        let header = request::ActiveModel {
            id: Set(request_id),
            user_id: Set(None),
            guest_id: Set(Some(guest_id)),
            status: Set(RequestStatus::Unconfirmed.to_string()),
            reason: Set(input.reason.clone()),
            due_date: Set(input.due_date),
            created_at: Set(now),
            reviewed_at: Set(None),
            returned_at: Set(None),
        };
        header.insert(&*self.db_pool).await?;
        self.insert_lines(request_id, &input.items).await?;

        info!(%request_id, "guest request submitted");
        self.send_event(Event::GuestRequestSubmitted {
            request_id,
            guest_id,
        })
        .await?;

        self.get_request(request_id).await
    }

    /// Move a confirmed guest's unconfirmed requests into the pending pool.
    /// Token verification happens in the guest service before this is called.
    #[instrument(skip(self))]
    pub async fn confirm_guest_requests(&self, guest_id: Uuid) -> Result<u64, ServiceError> {
        let unconfirmed = request::Entity::find()
            .filter(request::Column::GuestId.eq(guest_id))
            .filter(request::Column::Status.eq(RequestStatus::Unconfirmed.to_string()))
            .all(&*self.db_pool)
            .await?;

        let mut moved = 0u64;
        for row in unconfirmed {
            let request_id = row.id;
            let mut active: request::ActiveModel = row.into();
            active.status = Set(RequestStatus::Pending.to_string());
            active.update(&*self.db_pool).await?;
            moved += 1;

            self.send_event(Event::RequestStatusChanged {
                request_id,
                old_status: RequestStatus::Unconfirmed,
                new_status: RequestStatus::Pending,
            })
            .await?;
        }

        info!(%guest_id, moved, "guest requests confirmed");
        Ok(moved)
    }

    #[instrument(skip(self))]
    pub async fn get_request(&self, request_id: Uuid) -> Result<RequestDetail, ServiceError> {
        let header = request::Entity::find_by_id(request_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Request {} not found", request_id)))?;

        let lines = request_item::Entity::find()
            .filter(request_item::Column::RequestId.eq(request_id))
            .find_also_related(item::Entity)
            .all(&*self.db_pool)
            .await?;

        let mut items = Vec::with_capacity(lines.len());
        for (line, item) in lines {
            let item = item.ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "Request line {} references a missing item",
                    line.id
                ))
            })?;
            items.push(RequestLineDetail {
                id: line.id,
                item_id: item.id,
                item_name: item.name.clone(),
                item_level: Role::item_level_or_closed(Some(&item.level)),
                quantity: line.quantity,
                returned_quantity: line.returned_quantity,
            });
        }

        Ok(RequestDetail {
            request: header,
            items,
        })
    }

    /// Paginated listing with optional status, user and guest filters.
    #[instrument(skip(self))]
    pub async fn list_requests(
        &self,
        filter: RequestFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<request::Model>, u64), ServiceError> {
        let mut condition = Condition::all();
        if let Some(status) = filter.status {
            condition = condition.add(request::Column::Status.eq(status.to_string()));
        }
        if let Some(user_id) = filter.user_id {
            condition = condition.add(request::Column::UserId.eq(user_id));
        }
        if let Some(guest_id) = filter.guest_id {
            condition = condition.add(request::Column::GuestId.eq(guest_id));
        }

        let total = request::Entity::find()
            .filter(condition.clone())
            .count(&*self.db_pool)
            .await?;

        let rows = request::Entity::find()
            .filter(condition)
            .order_by_desc(request::Column::CreatedAt)
            .offset(page.saturating_sub(1) * per_page)
            .limit(per_page)
            .all(&*self.db_pool)
            .await?;

        Ok((rows, total))
    }

    /// All requests created by one user, newest first.
    #[instrument(skip(self))]
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<request::Model>, ServiceError> {
        let rows = request::Entity::find()
            .filter(request::Column::UserId.eq(user_id))
            .order_by_desc(request::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?;
        Ok(rows)
    }

    async fn transition(
        &self,
        request_id: Uuid,
        next: RequestStatus,
    ) -> Result<RequestDetail, ServiceError> {
        let header = request::Entity::find_by_id(request_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Request {} not found", request_id)))?;

        let current = parse_status(&header.status)?;
        if !current.can_transition_to(next) {
            return Err(ServiceError::InvalidStatus(format!(
                "Cannot move request from {} to {}",
                current, next
            )));
        }

        let now = Utc::now();
        let mut active: request::ActiveModel = header.into();
        active.status = Set(next.to_string());
        match next {
            RequestStatus::Approved | RequestStatus::Rejected => {
                active.reviewed_at = Set(Some(now));
            }
            RequestStatus::Returned => {
                active.returned_at = Set(Some(now));
            }
            _ => {}
        }
        active.update(&*self.db_pool).await?;

        info!(%request_id, from = %current, to = %next, "request status changed");
        self.send_event(Event::RequestStatusChanged {
            request_id,
            old_status: current,
            new_status: next,
        })
        .await?;

        self.get_request(request_id).await
    }

    /// Approve a pending request and stamp the review time.
    pub async fn approve_request(&self, request_id: Uuid) -> Result<RequestDetail, ServiceError> {
        self.transition(request_id, RequestStatus::Approved).await
    }

    /// Reject a pending request and stamp the review time.
    pub async fn reject_request(&self, request_id: Uuid) -> Result<RequestDetail, ServiceError> {
        self.transition(request_id, RequestStatus::Rejected).await
    }

    /// Mark an approved or overdue request returned and stamp the return time.
    pub async fn mark_returned(&self, request_id: Uuid) -> Result<RequestDetail, ServiceError> {
        self.transition(request_id, RequestStatus::Returned).await
    }

    /// Edit the lines, reason or due date of a request that has not been
    /// reviewed yet. Replacement lines are validated and re-resolved; the
    /// approval decision is not re-run, the request stays where it is.
    #[instrument(skip(self, input))]
    pub async fn update_request(
        &self,
        request_id: Uuid,
        input: UpdateRequestInput,
    ) -> Result<RequestDetail, ServiceError> {
        input.validate()?;

        let header = request::Entity::find_by_id(request_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Request {} not found", request_id)))?;

        let current = parse_status(&header.status)?;
        if !current.reviewable() {
            return Err(ServiceError::InvalidStatus(format!(
                "Only pending requests can be edited, request is {}",
                current
            )));
        }

        if let Some(lines) = &input.items {
            if lines.is_empty() {
                return Err(ServiceError::ValidationError(
                    "A request must keep at least one item".to_string(),
                ));
            }
            self.resolve_lines(lines).await?;

            // Replace lines wholesale inside one transaction.
            let txn = self.db_pool.begin().await?;
            request_item::Entity::delete_many()
                .filter(request_item::Column::RequestId.eq(request_id))
                .exec(&txn)
                .await?;
            let now = Utc::now();
            for line in lines {
                let row = request_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    request_id: Set(request_id),
                    item_id: Set(line.item_id),
                    quantity: Set(line.quantity),
                    returned_quantity: Set(None),
                    created_at: Set(now),
                };
                row.insert(&txn).await?;
            }
            txn.commit().await?;
        }

        let mut active: request::ActiveModel = header.into();
        if input.reason.is_some() {
            active.reason = Set(input.reason);
        }
        if input.due_date.is_some() {
            active.due_date = Set(input.due_date);
        }
        active.update(&*self.db_pool).await?;

        self.get_request(request_id).await
    }

    #[instrument(skip(self))]
    pub async fn delete_request(&self, request_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db_pool.begin().await?;
        request_item::Entity::delete_many()
            .filter(request_item::Column::RequestId.eq(request_id))
            .exec(&txn)
            .await?;
        let result = request::Entity::delete_by_id(request_id).exec(&txn).await?;
        txn.commit().await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Request {} not found",
                request_id
            )));
        }
        info!(%request_id, "request deleted");
        Ok(())
    }
}
