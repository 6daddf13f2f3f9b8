//! Support domain module: help-desk tickets raised by a tenant's users.

pub mod ticket;

pub use ticket::{
    AddComment, CloseTicket, Comment, CommentAdded, OpenTicket, ReopenTicket, ResolveTicket,
    StartProgress, SupportTicket, TicketClosed, TicketCommand, TicketEvent, TicketOpened,
    TicketPriority, TicketReopened, TicketResolved, TicketStatus, WorkStarted,
};
