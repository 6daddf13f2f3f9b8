use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use aura_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId, UserId, require_non_blank};
use aura_events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TicketPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub author: UserId,
    pub body: String,
    pub at: DateTime<Utc>,
}

/// Aggregate root: a support ticket.
///
/// Lifecycle: `open → in_progress → resolved → closed`, with `resolved → open`
/// on reopen. Closed tickets accept nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportTicket {
    id: AggregateId,
    tenant_id: Option<TenantId>,
    opened_by: Option<UserId>,
    subject: String,
    status: TicketStatus,
    comments: Vec<Comment>,
    version: u64,
    created: bool,
}

impl SupportTicket {
    pub fn empty(id: AggregateId) -> Self {
        Self {
            id,
            tenant_id: None,
            opened_by: None,
            subject: String::new(),
            status: TicketStatus::Open,
            comments: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn status(&self) -> TicketStatus {
        self.status
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn opened_by(&self) -> Option<UserId> {
        self.opened_by
    }

    fn ensure_created(&self, tenant_id: TenantId) -> Result<UserId, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        self.opened_by
            .ok_or_else(|| DomainError::invariant("ticket has no owner"))
    }

    fn transition_error(&self, action: &str) -> DomainError {
        DomainError::invariant(format!("cannot {action} a ticket that is {}", self.status.as_str()))
    }
}

impl AggregateRoot for SupportTicket {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenTicket {
    pub tenant_id: TenantId,
    pub opened_by: UserId,
    pub subject: String,
    pub description: String,
    pub priority: TicketPriority,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddComment {
    pub tenant_id: TenantId,
    pub author: UserId,
    pub body: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartProgress {
    pub tenant_id: TenantId,
    pub by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveTicket {
    pub tenant_id: TenantId,
    pub by: UserId,
    pub resolution: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseTicket {
    pub tenant_id: TenantId,
    pub by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReopenTicket {
    pub tenant_id: TenantId,
    pub by: UserId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketCommand {
    Open(OpenTicket),
    Comment(AddComment),
    StartProgress(StartProgress),
    Resolve(ResolveTicket),
    Close(CloseTicket),
    Reopen(ReopenTicket),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketOpened {
    pub tenant_id: TenantId,
    pub ticket_id: AggregateId,
    pub opened_by: UserId,
    pub subject: String,
    pub description: String,
    pub priority: TicketPriority,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentAdded {
    pub tenant_id: TenantId,
    pub ticket_id: AggregateId,
    pub opened_by: UserId,
    pub author: UserId,
    pub body: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkStarted {
    pub tenant_id: TenantId,
    pub ticket_id: AggregateId,
    pub opened_by: UserId,
    pub by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketResolved {
    pub tenant_id: TenantId,
    pub ticket_id: AggregateId,
    pub opened_by: UserId,
    pub by: UserId,
    pub resolution: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketClosed {
    pub tenant_id: TenantId,
    pub ticket_id: AggregateId,
    pub opened_by: UserId,
    pub by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketReopened {
    pub tenant_id: TenantId,
    pub ticket_id: AggregateId,
    pub opened_by: UserId,
    pub by: UserId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketEvent {
    Opened(TicketOpened),
    CommentAdded(CommentAdded),
    WorkStarted(WorkStarted),
    Resolved(TicketResolved),
    Closed(TicketClosed),
    Reopened(TicketReopened),
}

impl Event for TicketEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TicketEvent::Opened(_) => "support.ticket.opened",
            TicketEvent::CommentAdded(_) => "support.ticket.comment_added",
            TicketEvent::WorkStarted(_) => "support.ticket.work_started",
            TicketEvent::Resolved(_) => "support.ticket.resolved",
            TicketEvent::Closed(_) => "support.ticket.closed",
            TicketEvent::Reopened(_) => "support.ticket.reopened",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TicketEvent::Opened(e) => e.occurred_at,
            TicketEvent::CommentAdded(e) => e.occurred_at,
            TicketEvent::WorkStarted(e) => e.occurred_at,
            TicketEvent::Resolved(e) => e.occurred_at,
            TicketEvent::Closed(e) => e.occurred_at,
            TicketEvent::Reopened(e) => e.occurred_at,
        }
    }
}

impl Aggregate for SupportTicket {
    type Command = TicketCommand;
    type Event = TicketEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TicketEvent::Opened(e) => {
                self.tenant_id = Some(e.tenant_id);
                self.opened_by = Some(e.opened_by);
                self.subject = e.subject.clone();
                self.status = TicketStatus::Open;
                self.created = true;
            }
            TicketEvent::CommentAdded(e) => self.comments.push(Comment {
                author: e.author,
                body: e.body.clone(),
                at: e.occurred_at,
            }),
            TicketEvent::WorkStarted(_) => self.status = TicketStatus::InProgress,
            TicketEvent::Resolved(_) => self.status = TicketStatus::Resolved,
            TicketEvent::Closed(_) => self.status = TicketStatus::Closed,
            TicketEvent::Reopened(_) => self.status = TicketStatus::Open,
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TicketCommand::Open(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("ticket already exists"));
                }
                require_non_blank("subject", &cmd.subject)?;
                require_non_blank("description", &cmd.description)?;
                Ok(vec![TicketEvent::Opened(TicketOpened {
                    tenant_id: cmd.tenant_id,
                    ticket_id: self.id,
                    opened_by: cmd.opened_by,
                    subject: cmd.subject.trim().to_string(),
                    description: cmd.description.trim().to_string(),
                    priority: cmd.priority,
                    occurred_at: cmd.occurred_at,
                })])
            }
            TicketCommand::Comment(cmd) => {
                let opened_by = self.ensure_created(cmd.tenant_id)?;
                if self.status == TicketStatus::Closed {
                    return Err(self.transition_error("comment on"));
                }
                require_non_blank("body", &cmd.body)?;
                Ok(vec![TicketEvent::CommentAdded(CommentAdded {
                    tenant_id: cmd.tenant_id,
                    ticket_id: self.id,
                    opened_by,
                    author: cmd.author,
                    body: cmd.body.trim().to_string(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            TicketCommand::StartProgress(cmd) => {
                let opened_by = self.ensure_created(cmd.tenant_id)?;
                if self.status != TicketStatus::Open {
                    return Err(self.transition_error("start work on"));
                }
                Ok(vec![TicketEvent::WorkStarted(WorkStarted {
                    tenant_id: cmd.tenant_id,
                    ticket_id: self.id,
                    opened_by,
                    by: cmd.by,
                    occurred_at: cmd.occurred_at,
                })])
            }
            TicketCommand::Resolve(cmd) => {
                let opened_by = self.ensure_created(cmd.tenant_id)?;
                if !matches!(self.status, TicketStatus::Open | TicketStatus::InProgress) {
                    return Err(self.transition_error("resolve"));
                }
                Ok(vec![TicketEvent::Resolved(TicketResolved {
                    tenant_id: cmd.tenant_id,
                    ticket_id: self.id,
                    opened_by,
                    by: cmd.by,
                    resolution: cmd.resolution.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            TicketCommand::Close(cmd) => {
                let opened_by = self.ensure_created(cmd.tenant_id)?;
                if self.status != TicketStatus::Resolved {
                    return Err(self.transition_error("close"));
                }
                Ok(vec![TicketEvent::Closed(TicketClosed {
                    tenant_id: cmd.tenant_id,
                    ticket_id: self.id,
                    opened_by,
                    by: cmd.by,
                    occurred_at: cmd.occurred_at,
                })])
            }
            TicketCommand::Reopen(cmd) => {
                let opened_by = self.ensure_created(cmd.tenant_id)?;
                if self.status != TicketStatus::Resolved {
                    return Err(self.transition_error("reopen"));
                }
                Ok(vec![TicketEvent::Reopened(TicketReopened {
                    tenant_id: cmd.tenant_id,
                    ticket_id: self.id,
                    opened_by,
                    by: cmd.by,
                    reason: cmd.reason.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Desk {
        tenant_id: TenantId,
        agent: UserId,
        ticket: SupportTicket,
    }

    impl Desk {
        fn open() -> Self {
            let tenant_id = TenantId::new();
            let mut ticket = SupportTicket::empty(AggregateId::new());
            let events = ticket
                .handle(&TicketCommand::Open(OpenTicket {
                    tenant_id,
                    opened_by: UserId::new(),
                    subject: "Payslip missing".to_string(),
                    description: "May payslip not visible".to_string(),
                    priority: TicketPriority::High,
                    occurred_at: Utc::now(),
                }))
                .unwrap();
            ticket.apply(&events[0]);
            Self {
                tenant_id,
                agent: UserId::new(),
                ticket,
            }
        }

        fn run(&mut self, cmd: TicketCommand) -> Result<(), DomainError> {
            aura_events::execute(&mut self.ticket, &cmd).map(|_| ())
        }

        fn resolve(&mut self) -> Result<(), DomainError> {
            self.run(TicketCommand::Resolve(ResolveTicket {
                tenant_id: self.tenant_id,
                by: self.agent,
                resolution: Some("re-published".to_string()),
                occurred_at: Utc::now(),
            }))
        }

        fn close(&mut self) -> Result<(), DomainError> {
            self.run(TicketCommand::Close(CloseTicket {
                tenant_id: self.tenant_id,
                by: self.agent,
                occurred_at: Utc::now(),
            }))
        }

        fn comment(&mut self, body: &str) -> Result<(), DomainError> {
            self.run(TicketCommand::Comment(AddComment {
                tenant_id: self.tenant_id,
                author: self.agent,
                body: body.to_string(),
                occurred_at: Utc::now(),
            }))
        }
    }

    #[test]
    fn full_lifecycle() {
        let mut desk = Desk::open();
        desk.run(TicketCommand::StartProgress(StartProgress {
            tenant_id: desk.tenant_id,
            by: desk.agent,
            occurred_at: Utc::now(),
        }))
        .unwrap();
        assert_eq!(desk.ticket.status(), TicketStatus::InProgress);
        desk.comment("looking into it").unwrap();
        desk.resolve().unwrap();
        desk.close().unwrap();
        assert_eq!(desk.ticket.status(), TicketStatus::Closed);
        assert_eq!(desk.ticket.comments().len(), 1);
    }

    #[test]
    fn closed_ticket_is_frozen() {
        let mut desk = Desk::open();
        desk.resolve().unwrap();
        desk.close().unwrap();
        assert!(desk.comment("one more thing").is_err());
        assert!(desk
            .run(TicketCommand::Reopen(ReopenTicket {
                tenant_id: desk.tenant_id,
                by: desk.agent,
                reason: None,
                occurred_at: Utc::now(),
            }))
            .is_err());
    }

    #[test]
    fn open_ticket_cannot_be_closed_directly() {
        let mut desk = Desk::open();
        assert!(matches!(desk.close().unwrap_err(), DomainError::InvariantViolation(_)));
    }

    #[test]
    fn reopen_from_resolved() {
        let mut desk = Desk::open();
        desk.resolve().unwrap();
        desk.run(TicketCommand::Reopen(ReopenTicket {
            tenant_id: desk.tenant_id,
            by: desk.agent,
            reason: Some("still missing".to_string()),
            occurred_at: Utc::now(),
        }))
        .unwrap();
        assert_eq!(desk.ticket.status(), TicketStatus::Open);
    }

    #[test]
    fn blank_comment_rejected() {
        let mut desk = Desk::open();
        assert!(matches!(desk.comment("   ").unwrap_err(), DomainError::Validation(_)));
    }
}
