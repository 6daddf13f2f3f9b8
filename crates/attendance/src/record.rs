use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use aura_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use aura_events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    #[default]
    Present,
    Absent,
    HalfDay,
    OnLeave,
    Holiday,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::HalfDay => "half_day",
            AttendanceStatus::OnLeave => "on_leave",
            AttendanceStatus::Holiday => "holiday",
        }
    }
}

/// Aggregate root: an employee's attendance for one day.
///
/// The id is derived from `(tenant, employee, date)`, so a day can only ever
/// have one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceRecord {
    id: AggregateId,
    tenant_id: Option<TenantId>,
    employee_id: Option<AggregateId>,
    date: Option<NaiveDate>,
    status: AttendanceStatus,
    check_in: Option<DateTime<Utc>>,
    check_out: Option<DateTime<Utc>>,
    notes: Option<String>,
    version: u64,
    created: bool,
}

impl AttendanceRecord {
    pub fn empty(id: AggregateId) -> Self {
        Self {
            id,
            tenant_id: None,
            employee_id: None,
            date: None,
            status: AttendanceStatus::Present,
            check_in: None,
            check_out: None,
            notes: None,
            version: 0,
            created: false,
        }
    }

    pub fn record_id(tenant_id: TenantId, employee_id: AggregateId, date: NaiveDate) -> AggregateId {
        AggregateId::derived(
            "attendance.record",
            tenant_id,
            &[&employee_id.to_string(), &date.to_string()],
        )
    }

    pub fn status(&self) -> AttendanceStatus {
        self.status
    }

    pub fn check_in(&self) -> Option<DateTime<Utc>> {
        self.check_in
    }

    pub fn check_out(&self) -> Option<DateTime<Utc>> {
        self.check_out
    }

    pub fn worked_minutes(&self) -> Option<i64> {
        worked_minutes(self.check_in, self.check_out)
    }

    fn ensure_day(&self, tenant_id: TenantId, employee_id: AggregateId, date: NaiveDate) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.employee_id != Some(employee_id) || self.date != Some(date) {
            return Err(DomainError::invariant("record belongs to another employee or day"));
        }
        Ok(())
    }
}

/// Minutes between check-in and check-out; `None` until both are known.
pub fn worked_minutes(check_in: Option<DateTime<Utc>>, check_out: Option<DateTime<Utc>>) -> Option<i64> {
    match (check_in, check_out) {
        (Some(i), Some(o)) if o > i => Some((o - i).num_minutes()),
        _ => None,
    }
}

impl AggregateRoot for AttendanceRecord {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckIn {
    pub tenant_id: TenantId,
    pub employee_id: AggregateId,
    pub date: NaiveDate,
    pub at: DateTime<Utc>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOut {
    pub tenant_id: TenantId,
    pub employee_id: AggregateId,
    pub date: NaiveDate,
    pub at: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Admin sets the day's status directly (absent, holiday, on leave, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkAttendance {
    pub tenant_id: TenantId,
    pub employee_id: AggregateId,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Admin edits the recorded times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectAttendance {
    pub tenant_id: TenantId,
    pub employee_id: AggregateId,
    pub date: NaiveDate,
    pub check_in: Option<DateTime<Utc>>,
    pub check_out: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceCommand {
    CheckIn(CheckIn),
    CheckOut(CheckOut),
    Mark(MarkAttendance),
    Correct(CorrectAttendance),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckedIn {
    pub tenant_id: TenantId,
    pub employee_id: AggregateId,
    pub date: NaiveDate,
    pub at: DateTime<Utc>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckedOut {
    pub tenant_id: TenantId,
    pub employee_id: AggregateId,
    pub date: NaiveDate,
    pub at: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceMarked {
    pub tenant_id: TenantId,
    pub employee_id: AggregateId,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceCorrected {
    pub tenant_id: TenantId,
    pub employee_id: AggregateId,
    pub date: NaiveDate,
    pub check_in: Option<DateTime<Utc>>,
    pub check_out: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceEvent {
    CheckedIn(CheckedIn),
    CheckedOut(CheckedOut),
    Marked(AttendanceMarked),
    Corrected(AttendanceCorrected),
}

impl Event for AttendanceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AttendanceEvent::CheckedIn(_) => "attendance.record.checked_in",
            AttendanceEvent::CheckedOut(_) => "attendance.record.checked_out",
            AttendanceEvent::Marked(_) => "attendance.record.marked",
            AttendanceEvent::Corrected(_) => "attendance.record.corrected",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AttendanceEvent::CheckedIn(e) => e.occurred_at,
            AttendanceEvent::CheckedOut(e) => e.occurred_at,
            AttendanceEvent::Marked(e) => e.occurred_at,
            AttendanceEvent::Corrected(e) => e.occurred_at,
        }
    }
}

impl Aggregate for AttendanceRecord {
    type Command = AttendanceCommand;
    type Event = AttendanceEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        let (tenant_id, employee_id, date) = match event {
            AttendanceEvent::CheckedIn(e) => (e.tenant_id, e.employee_id, e.date),
            AttendanceEvent::CheckedOut(e) => (e.tenant_id, e.employee_id, e.date),
            AttendanceEvent::Marked(e) => (e.tenant_id, e.employee_id, e.date),
            AttendanceEvent::Corrected(e) => (e.tenant_id, e.employee_id, e.date),
        };
        self.tenant_id = Some(tenant_id);
        self.employee_id = Some(employee_id);
        self.date = Some(date);
        self.created = true;

        match event {
            AttendanceEvent::CheckedIn(e) => {
                self.status = AttendanceStatus::Present;
                self.check_in = Some(e.at);
                if e.notes.is_some() {
                    self.notes = e.notes.clone();
                }
            }
            AttendanceEvent::CheckedOut(e) => self.check_out = Some(e.at),
            AttendanceEvent::Marked(e) => {
                self.status = e.status;
                if e.notes.is_some() {
                    self.notes = e.notes.clone();
                }
            }
            AttendanceEvent::Corrected(e) => {
                self.check_in = e.check_in;
                self.check_out = e.check_out;
                if e.check_in.is_some() && self.status != AttendanceStatus::HalfDay {
                    self.status = AttendanceStatus::Present;
                }
                if e.notes.is_some() {
                    self.notes = e.notes.clone();
                }
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            AttendanceCommand::CheckIn(cmd) => self.handle_check_in(cmd),
            AttendanceCommand::CheckOut(cmd) => self.handle_check_out(cmd),
            AttendanceCommand::Mark(cmd) => self.handle_mark(cmd),
            AttendanceCommand::Correct(cmd) => self.handle_correct(cmd),
        }
    }
}

impl AttendanceRecord {
    fn handle_check_in(&self, cmd: &CheckIn) -> Result<Vec<AttendanceEvent>, DomainError> {
        self.ensure_day(cmd.tenant_id, cmd.employee_id, cmd.date)?;
        if self.check_in.is_some() {
            return Err(DomainError::conflict("already checked in for this day"));
        }
        if self.created && !matches!(self.status, AttendanceStatus::Present | AttendanceStatus::HalfDay) {
            return Err(DomainError::invariant(format!(
                "day is marked as {}",
                self.status.as_str()
            )));
        }

        Ok(vec![AttendanceEvent::CheckedIn(CheckedIn {
            tenant_id: cmd.tenant_id,
            employee_id: cmd.employee_id,
            date: cmd.date,
            at: cmd.at,
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_check_out(&self, cmd: &CheckOut) -> Result<Vec<AttendanceEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_day(cmd.tenant_id, cmd.employee_id, cmd.date)?;
        let Some(check_in) = self.check_in else {
            return Err(DomainError::invariant("cannot check out before checking in"));
        };
        if self.check_out.is_some() {
            return Err(DomainError::conflict("already checked out for this day"));
        }
        if cmd.at <= check_in {
            return Err(DomainError::validation("check-out must be after check-in"));
        }

        Ok(vec![AttendanceEvent::CheckedOut(CheckedOut {
            tenant_id: cmd.tenant_id,
            employee_id: cmd.employee_id,
            date: cmd.date,
            at: cmd.at,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark(&self, cmd: &MarkAttendance) -> Result<Vec<AttendanceEvent>, DomainError> {
        self.ensure_day(cmd.tenant_id, cmd.employee_id, cmd.date)?;
        if self.created && self.status == cmd.status && cmd.notes.is_none() {
            return Ok(vec![]);
        }

        Ok(vec![AttendanceEvent::Marked(AttendanceMarked {
            tenant_id: cmd.tenant_id,
            employee_id: cmd.employee_id,
            date: cmd.date,
            status: cmd.status,
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_correct(&self, cmd: &CorrectAttendance) -> Result<Vec<AttendanceEvent>, DomainError> {
        self.ensure_day(cmd.tenant_id, cmd.employee_id, cmd.date)?;
        match (cmd.check_in, cmd.check_out) {
            (None, Some(_)) => {
                return Err(DomainError::validation("check-out requires a check-in"));
            }
            (Some(i), Some(o)) if o <= i => {
                return Err(DomainError::validation("check-out must be after check-in"));
            }
            _ => {}
        }

        Ok(vec![AttendanceEvent::Corrected(AttendanceCorrected {
            tenant_id: cmd.tenant_id,
            employee_id: cmd.employee_id,
            date: cmd.date,
            check_in: cmd.check_in,
            check_out: cmd.check_out,
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
