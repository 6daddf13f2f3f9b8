use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use aura_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId, UserId};
use aura_events::Event;

use crate::business_days;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaveType {
    Annual,
    Sick,
    Casual,
    Unpaid,
    Maternity,
    Paternity,
}

impl LeaveType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveType::Annual => "annual",
            LeaveType::Sick => "sick",
            LeaveType::Casual => "casual",
            LeaveType::Unpaid => "unpaid",
            LeaveType::Maternity => "maternity",
            LeaveType::Paternity => "paternity",
        }
    }

    /// Counts against the annual allowance.
    pub fn uses_allowance(&self) -> bool {
        matches!(self, LeaveType::Annual | LeaveType::Casual)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LeaveStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl LeaveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveStatus::Pending => "pending",
            LeaveStatus::Approved => "approved",
            LeaveStatus::Rejected => "rejected",
            LeaveStatus::Cancelled => "cancelled",
        }
    }
}

/// Aggregate root: one leave request.
///
/// # Invariants
/// - `end >= start` and the range covers at least one business day.
/// - Only pending requests are decided (approved/rejected).
/// - Only pending or approved requests that have not started can be cancelled,
///   and an employee can only cancel their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveRequest {
    id: AggregateId,
    tenant_id: Option<TenantId>,
    employee_id: Option<AggregateId>,
    leave_type: Option<LeaveType>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    days: u32,
    status: LeaveStatus,
    version: u64,
    created: bool,
}

impl LeaveRequest {
    pub fn empty(id: AggregateId) -> Self {
        Self {
            id,
            tenant_id: None,
            employee_id: None,
            leave_type: None,
            start: None,
            end: None,
            days: 0,
            status: LeaveStatus::Pending,
            version: 0,
            created: false,
        }
    }

    pub fn status(&self) -> LeaveStatus {
        self.status
    }

    pub fn days(&self) -> u32 {
        self.days
    }

    pub fn employee_id(&self) -> Option<AggregateId> {
        self.employee_id
    }

    fn ensure_created(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_pending(&self) -> Result<(), DomainError> {
        if self.status != LeaveStatus::Pending {
            return Err(DomainError::invariant(format!(
                "leave request is {}",
                self.status.as_str()
            )));
        }
        Ok(())
    }

    /// Fields every decision event repeats so read models need no lookups.
    fn summary(&self) -> Result<(AggregateId, LeaveType, NaiveDate, NaiveDate), DomainError> {
        match (self.employee_id, self.leave_type, self.start, self.end) {
            (Some(e), Some(t), Some(s), Some(en)) => Ok((e, t, s, en)),
            _ => Err(DomainError::invariant("leave request is incomplete")),
        }
    }
}

impl AggregateRoot for LeaveRequest {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitLeave {
    pub tenant_id: TenantId,
    pub request_id: AggregateId,
    pub employee_id: AggregateId,
    pub leave_type: LeaveType,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveLeave {
    pub tenant_id: TenantId,
    pub request_id: AggregateId,
    pub reviewer: UserId,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectLeave {
    pub tenant_id: TenantId,
    pub request_id: AggregateId,
    pub reviewer: UserId,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelLeave {
    pub tenant_id: TenantId,
    pub request_id: AggregateId,
    /// Set when an employee (not an admin) cancels; must own the request.
    pub acting_employee: Option<AggregateId>,
    pub today: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaveCommand {
    Submit(SubmitLeave),
    Approve(ApproveLeave),
    Reject(RejectLeave),
    Cancel(CancelLeave),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveSubmitted {
    pub tenant_id: TenantId,
    pub request_id: AggregateId,
    pub employee_id: AggregateId,
    pub leave_type: LeaveType,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: u32,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveApproved {
    pub tenant_id: TenantId,
    pub request_id: AggregateId,
    pub employee_id: AggregateId,
    pub leave_type: LeaveType,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: u32,
    pub reviewer: UserId,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRejected {
    pub tenant_id: TenantId,
    pub request_id: AggregateId,
    pub employee_id: AggregateId,
    pub leave_type: LeaveType,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub reviewer: UserId,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveCancelled {
    pub tenant_id: TenantId,
    pub request_id: AggregateId,
    pub employee_id: AggregateId,
    /// Status before cancellation (pending or approved).
    pub previous: LeaveStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaveEvent {
    Submitted(LeaveSubmitted),
    Approved(LeaveApproved),
    Rejected(LeaveRejected),
    Cancelled(LeaveCancelled),
}

impl Event for LeaveEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LeaveEvent::Submitted(_) => "leave.request.submitted",
            LeaveEvent::Approved(_) => "leave.request.approved",
            LeaveEvent::Rejected(_) => "leave.request.rejected",
            LeaveEvent::Cancelled(_) => "leave.request.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LeaveEvent::Submitted(e) => e.occurred_at,
            LeaveEvent::Approved(e) => e.occurred_at,
            LeaveEvent::Rejected(e) => e.occurred_at,
            LeaveEvent::Cancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for LeaveRequest {
    type Command = LeaveCommand;
    type Event = LeaveEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LeaveEvent::Submitted(e) => {
                self.id = e.request_id;
                self.tenant_id = Some(e.tenant_id);
                self.employee_id = Some(e.employee_id);
                self.leave_type = Some(e.leave_type);
                self.start = Some(e.start);
                self.end = Some(e.end);
                self.days = e.days;
                self.status = LeaveStatus::Pending;
                self.created = true;
            }
            LeaveEvent::Approved(_) => self.status = LeaveStatus::Approved,
            LeaveEvent::Rejected(_) => self.status = LeaveStatus::Rejected,
            LeaveEvent::Cancelled(_) => self.status = LeaveStatus::Cancelled,
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            LeaveCommand::Submit(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("leave request already exists"));
                }
                if cmd.end < cmd.start {
                    return Err(DomainError::validation("end date precedes start date"));
                }
                let days = business_days(cmd.start, cmd.end);
                if days == 0 {
                    return Err(DomainError::validation("leave range contains no working days"));
                }
                Ok(vec![LeaveEvent::Submitted(LeaveSubmitted {
                    tenant_id: cmd.tenant_id,
                    request_id: cmd.request_id,
                    employee_id: cmd.employee_id,
                    leave_type: cmd.leave_type,
                    start: cmd.start,
                    end: cmd.end,
                    days,
                    reason: cmd.reason.as_ref().map(|r| r.trim().to_string()),
                    occurred_at: cmd.occurred_at,
                })])
            }
            LeaveCommand::Approve(cmd) => {
                self.ensure_created(cmd.tenant_id)?;
                self.ensure_pending()?;
                let (employee_id, leave_type, start, end) = self.summary()?;
                Ok(vec![LeaveEvent::Approved(LeaveApproved {
                    tenant_id: cmd.tenant_id,
                    request_id: self.id,
                    employee_id,
                    leave_type,
                    start,
                    end,
                    days: self.days,
                    reviewer: cmd.reviewer,
                    note: cmd.note.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            LeaveCommand::Reject(cmd) => {
                self.ensure_created(cmd.tenant_id)?;
                self.ensure_pending()?;
                let (employee_id, leave_type, start, end) = self.summary()?;
                Ok(vec![LeaveEvent::Rejected(LeaveRejected {
                    tenant_id: cmd.tenant_id,
                    request_id: self.id,
                    employee_id,
                    leave_type,
                    start,
                    end,
                    reviewer: cmd.reviewer,
                    note: cmd.note.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            LeaveCommand::Cancel(cmd) => {
                self.ensure_created(cmd.tenant_id)?;
                let (employee_id, _, start, _) = self.summary()?;
                if cmd.acting_employee.is_some_and(|actor| actor != employee_id) {
                    return Err(DomainError::Unauthorized);
                }
                if !matches!(self.status, LeaveStatus::Pending | LeaveStatus::Approved) {
                    return Err(DomainError::invariant(format!(
                        "leave request is {}",
                        self.status.as_str()
                    )));
                }
                if start <= cmd.today {
                    return Err(DomainError::invariant("leave has already started"));
                }
                Ok(vec![LeaveEvent::Cancelled(LeaveCancelled {
                    tenant_id: cmd.tenant_id,
                    request_id: self.id,
                    employee_id,
                    previous: self.status,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}
