//! Support tickets per tenant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use aura_core::{AggregateId, TenantId, UserId};
use aura_events::EventEnvelope;
use aura_support::{Comment, TicketEvent, TicketPriority, TicketStatus};

use super::{ProjectionError, StreamCursors, aggregate_types, decode, ensure_tenant};
use crate::read_model::TenantStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketReadModel {
    pub ticket_id: AggregateId,
    pub opened_by: UserId,
    pub subject: String,
    pub description: String,
    pub priority: TicketPriority,
    pub status: TicketStatus,
    pub comments: Vec<Comment>,
    pub resolution: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct TicketsProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> TicketsProjection<S>
where
    S: TenantStore<AggregateId, TicketReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, ticket_id: AggregateId) -> Option<TicketReadModel> {
        self.store.get(tenant_id, &ticket_id)
    }

    /// Newest first; `opened_by` narrows to one user's tickets.
    pub fn list(&self, tenant_id: TenantId, opened_by: Option<UserId>) -> Vec<TicketReadModel> {
        let mut rows: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|t| opened_by.is_none_or(|u| u == t.opened_by))
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != aggregate_types::TICKET {
            return Ok(());
        }
        if !self.cursors.should_apply(envelope)? {
            return Ok(());
        }

        let event: TicketEvent = decode(envelope)?;
        let tenant_id = envelope.tenant_id();
        match event {
            TicketEvent::Opened(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                self.store.upsert(
                    tenant_id,
                    e.ticket_id,
                    TicketReadModel {
                        ticket_id: e.ticket_id,
                        opened_by: e.opened_by,
                        subject: e.subject,
                        description: e.description,
                        priority: e.priority,
                        status: TicketStatus::Open,
                        comments: vec![],
                        resolution: None,
                        created_at: e.occurred_at,
                        updated_at: e.occurred_at,
                    },
                );
            }
            TicketEvent::CommentAdded(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                self.update(tenant_id, e.ticket_id, e.occurred_at, |t| {
                    t.comments.push(Comment {
                        author: e.author,
                        body: e.body,
                        at: e.occurred_at,
                    });
                });
            }
            TicketEvent::WorkStarted(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                self.update(tenant_id, e.ticket_id, e.occurred_at, |t| t.status = TicketStatus::InProgress);
            }
            TicketEvent::Resolved(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                self.update(tenant_id, e.ticket_id, e.occurred_at, |t| {
                    t.status = TicketStatus::Resolved;
                    t.resolution = e.resolution;
                });
            }
            TicketEvent::Closed(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                self.update(tenant_id, e.ticket_id, e.occurred_at, |t| t.status = TicketStatus::Closed);
            }
            TicketEvent::Reopened(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                self.update(tenant_id, e.ticket_id, e.occurred_at, |t| {
                    t.status = TicketStatus::Open;
                    t.resolution = None;
                });
            }
        }

        self.cursors.advance(envelope);
        Ok(())
    }

    fn update(&self, tenant_id: TenantId, ticket_id: AggregateId, at: DateTime<Utc>, f: impl FnOnce(&mut TicketReadModel)) {
        if let Some(mut row) = self.store.get(tenant_id, &ticket_id) {
            f(&mut row);
            row.updated_at = at;
            self.store.upsert(tenant_id, ticket_id, row);
        }
    }

    pub fn reset(&self, tenants: &[TenantId]) {
        for t in tenants {
            self.store.clear_tenant(*t);
        }
        self.cursors.clear();
    }
}
