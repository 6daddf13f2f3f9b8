//! In-app notifications derived from other streams.
//!
//! There is no notification aggregate: leave decisions, payslip approval,
//! ticket activity and tenant announcements are turned into rows here. The
//! notification id is the id of the event that caused it, so redelivery
//! cannot duplicate a row. Read marks live only in this read model and are
//! lost on rebuild.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use aura_core::{AggregateId, TenantId, UserId};
use aura_events::EventEnvelope;
use aura_leave::LeaveEvent;
use aura_payroll::PayslipEvent;
use aura_support::TicketEvent;
use aura_tenancy::{NotificationToggles, TenantEvent};

use super::{ProjectionError, StreamCursors, aggregate_types, decode, ensure_tenant};
use crate::read_model::TenantStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Recipient {
    /// Everyone in the tenant.
    Tenant,
    User(UserId),
    /// Whoever is linked to this employee record.
    Employee(AggregateId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationReadModel {
    pub notification_id: Uuid,
    pub recipient: Recipient,
    pub category: String,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub read_by: Vec<UserId>,
}

impl NotificationReadModel {
    pub fn is_for(&self, user_id: UserId, employee_id: Option<AggregateId>) -> bool {
        match self.recipient {
            Recipient::Tenant => true,
            Recipient::User(u) => u == user_id,
            Recipient::Employee(e) => employee_id == Some(e),
        }
    }

    pub fn is_read_by(&self, user_id: UserId) -> bool {
        self.read_by.contains(&user_id)
    }
}

#[derive(Debug)]
pub struct NotificationsProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> NotificationsProjection<S>
where
    S: TenantStore<Uuid, NotificationReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    /// Notifications visible to a user, newest first.
    pub fn list_for(&self, tenant_id: TenantId, user_id: UserId, employee_id: Option<AggregateId>) -> Vec<NotificationReadModel> {
        let mut rows: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|n| n.is_for(user_id, employee_id))
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows
    }

    /// Returns `false` when the notification does not exist or is not addressed to the user.
    pub fn mark_read(&self, tenant_id: TenantId, notification_id: Uuid, user_id: UserId, employee_id: Option<AggregateId>) -> bool {
        let Some(mut row) = self.store.get(tenant_id, &notification_id) else {
            return false;
        };
        if !row.is_for(user_id, employee_id) {
            return false;
        }
        if !row.is_read_by(user_id) {
            row.read_by.push(user_id);
            self.store.upsert(tenant_id, notification_id, row);
        }
        true
    }

    /// `toggles` resolves the notification settings of the tenant a row is written to.
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
        toggles: impl Fn(TenantId) -> NotificationToggles,
    ) -> Result<(), ProjectionError> {
        let at = envelope.aggregate_type();
        if ![aggregate_types::LEAVE, aggregate_types::PAYSLIP, aggregate_types::TICKET, aggregate_types::TENANT].contains(&at) {
            return Ok(());
        }
        if !self.cursors.should_apply(envelope)? {
            return Ok(());
        }

        if let Some((tenant_id, row)) = self.derive(envelope, &toggles)? {
            self.store.upsert(tenant_id, row.notification_id, row);
        }

        self.cursors.advance(envelope);
        Ok(())
    }

    fn derive(
        &self,
        envelope: &EventEnvelope<JsonValue>,
        toggles: &impl Fn(TenantId) -> NotificationToggles,
    ) -> Result<Option<(TenantId, NotificationReadModel)>, ProjectionError> {
        let id = envelope.event_id();
        let tenant_id = envelope.tenant_id();
        let row = |recipient, category: &str, title: String, message: String, created_at| NotificationReadModel {
            notification_id: id,
            recipient,
            category: category.to_string(),
            title,
            message,
            created_at,
            read_by: vec![],
        };

        let derived = match envelope.aggregate_type() {
            aggregate_types::LEAVE => {
                if !toggles(tenant_id).leave_decisions {
                    return Ok(None);
                }
                match decode::<LeaveEvent>(envelope)? {
                    LeaveEvent::Approved(e) => {
                        ensure_tenant(envelope, e.tenant_id)?;
                        Some(row(
                            Recipient::Employee(e.employee_id),
                            "leave",
                            "Leave approved".into(),
                            format!("Your {} leave from {} to {} was approved.", e.leave_type.as_str(), e.start, e.end),
                            e.occurred_at,
                        ))
                    }
                    LeaveEvent::Rejected(e) => {
                        ensure_tenant(envelope, e.tenant_id)?;
                        let note = e.note.map(|n| format!(" Note: {n}")).unwrap_or_default();
                        Some(row(
                            Recipient::Employee(e.employee_id),
                            "leave",
                            "Leave rejected".into(),
                            format!("Your {} leave from {} to {} was rejected.{note}", e.leave_type.as_str(), e.start, e.end),
                            e.occurred_at,
                        ))
                    }
                    _ => None,
                }
            }
            aggregate_types::PAYSLIP => {
                if !toggles(tenant_id).payslips {
                    return Ok(None);
                }
                match decode::<PayslipEvent>(envelope)? {
                    PayslipEvent::Approved(e) => {
                        ensure_tenant(envelope, e.tenant_id)?;
                        Some(row(
                            Recipient::Employee(e.employee_id),
                            "payroll",
                            format!("Payslip {} available", e.period),
                            format!("Your payslip for {} was approved. Net pay: {}.", e.period, e.net),
                            e.occurred_at,
                        ))
                    }
                    PayslipEvent::Paid(e) => {
                        ensure_tenant(envelope, e.tenant_id)?;
                        Some(row(
                            Recipient::Employee(e.employee_id),
                            "payroll",
                            format!("Payslip {} paid", e.period),
                            format!("Salary for {} was paid on {}.", e.period, e.paid_on),
                            e.occurred_at,
                        ))
                    }
                    _ => None,
                }
            }
            aggregate_types::TICKET => {
                if !toggles(tenant_id).tickets {
                    return Ok(None);
                }
                let ticket = envelope.aggregate_id();
                match decode::<TicketEvent>(envelope)? {
                    TicketEvent::CommentAdded(e) if e.author != e.opened_by => {
                        ensure_tenant(envelope, e.tenant_id)?;
                        Some(row(
                            Recipient::User(e.opened_by),
                            "support",
                            "New reply on your ticket".into(),
                            format!("Ticket {ticket} has a new comment."),
                            e.occurred_at,
                        ))
                    }
                    TicketEvent::WorkStarted(e) => {
                        ensure_tenant(envelope, e.tenant_id)?;
                        Some(row(Recipient::User(e.opened_by), "support", "Ticket in progress".into(), format!("Ticket {ticket} is being worked on."), e.occurred_at))
                    }
                    TicketEvent::Resolved(e) => {
                        ensure_tenant(envelope, e.tenant_id)?;
                        Some(row(Recipient::User(e.opened_by), "support", "Ticket resolved".into(), format!("Ticket {ticket} was resolved."), e.occurred_at))
                    }
                    TicketEvent::Closed(e) => {
                        ensure_tenant(envelope, e.tenant_id)?;
                        Some(row(Recipient::User(e.opened_by), "support", "Ticket closed".into(), format!("Ticket {ticket} was closed."), e.occurred_at))
                    }
                    _ => None,
                }
            }
            aggregate_types::TENANT => match decode::<TenantEvent>(envelope)? {
                // Tenant streams live in the system tenant; the row goes to the announced tenant.
                TenantEvent::AnnouncementPublished(e) => {
                    ensure_tenant(envelope, TenantId::system())?;
                    if !toggles(e.tenant_id).announcements {
                        return Ok(None);
                    }
                    return Ok(Some((
                        e.tenant_id,
                        row(Recipient::Tenant, "announcement", e.title, e.message, e.occurred_at),
                    )));
                }
                _ => None,
            },
            _ => None,
        };

        Ok(derived.map(|r| (tenant_id, r)))
    }

    pub fn reset(&self, tenants: &[TenantId]) {
        for t in tenants {
            self.store.clear_tenant(*t);
        }
        self.cursors.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use aura_leave::{LeaveApproved, LeaveType};
    use aura_tenancy::AnnouncementPublished;

    use super::*;
    use crate::read_model::InMemoryTenantStore;

    fn projection() -> NotificationsProjection<Arc<InMemoryTenantStore<Uuid, NotificationReadModel>>> {
        NotificationsProjection::new(Arc::new(InMemoryTenantStore::new()))
    }

    fn leave_approved(tenant: TenantId, employee: AggregateId) -> EventEnvelope<JsonValue> {
        let d = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let payload = serde_json::to_value(LeaveEvent::Approved(LeaveApproved {
            tenant_id: tenant,
            request_id: AggregateId::new(),
            employee_id: employee,
            leave_type: LeaveType::Annual,
            start: d,
            end: d,
            days: 1,
            reviewer: UserId::new(),
            note: None,
            occurred_at: Utc::now(),
        }))
        .unwrap();
        EventEnvelope::new(Uuid::now_v7(), tenant, AggregateId::new(), aggregate_types::LEAVE, "leave.request.approved", 2, Utc::now(), payload)
    }

    #[test]
    fn leave_decision_reaches_the_employee_only() {
        let p = projection();
        let tenant = TenantId::new();
        let emp = AggregateId::new();
        let env = leave_approved(tenant, emp);
        let cursors_seed = EventEnvelope::new(Uuid::now_v7(), tenant, env.aggregate_id(), aggregate_types::LEAVE, "leave.request.submitted", 1, Utc::now(), JsonValue::Null);
        p.cursors.advance(&cursors_seed);
        p.apply_envelope(&env, |_| NotificationToggles::default()).unwrap();
        // Redelivery is ignored.
        p.apply_envelope(&env, |_| NotificationToggles::default()).unwrap();

        let me = UserId::new();
        let rows = p.list_for(tenant, me, Some(emp));
        assert_eq!(rows.len(), 1);
        assert!(p.list_for(tenant, UserId::new(), Some(AggregateId::new())).is_empty());

        assert!(p.mark_read(tenant, rows[0].notification_id, me, Some(emp)));
        assert!(p.list_for(tenant, me, Some(emp))[0].is_read_by(me));
        assert!(!p.mark_read(tenant, rows[0].notification_id, UserId::new(), None));
    }

    #[test]
    fn disabled_toggle_suppresses_rows() {
        let p = projection();
        let tenant = TenantId::new();
        let emp = AggregateId::new();
        let env = leave_approved(tenant, emp);
        let seed = EventEnvelope::new(Uuid::now_v7(), tenant, env.aggregate_id(), aggregate_types::LEAVE, "leave.request.submitted", 1, Utc::now(), JsonValue::Null);
        p.cursors.advance(&seed);
        let off = NotificationToggles {
            leave_decisions: false,
            ..NotificationToggles::default()
        };
        p.apply_envelope(&env, |_| off.clone()).unwrap();
        assert!(p.list_for(tenant, UserId::new(), Some(emp)).is_empty());
    }

    #[test]
    fn announcement_lands_in_the_target_tenant() {
        let p = projection();
        let target = TenantId::new();
        let payload = serde_json::to_value(TenantEvent::AnnouncementPublished(AnnouncementPublished {
            tenant_id: target,
            title: "Maintenance".into(),
            message: "Sunday 02:00 UTC".into(),
            occurred_at: Utc::now(),
        }))
        .unwrap();
        let env = EventEnvelope::new(
            Uuid::now_v7(),
            TenantId::system(),
            AggregateId::from_uuid(*target.as_uuid()),
            aggregate_types::TENANT,
            "tenancy.tenant.announcement_published",
            1,
            Utc::now(),
            payload,
        );
        p.apply_envelope(&env, |_| NotificationToggles::default()).unwrap();

        let rows = p.list_for(target, UserId::new(), None);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].recipient, Recipient::Tenant);
        assert!(p.list_for(TenantId::system(), UserId::new(), None).is_empty());
    }
}
