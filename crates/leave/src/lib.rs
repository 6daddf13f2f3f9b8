//! Leave domain module: leave requests and leave-day arithmetic.

pub mod days;
pub mod request;

pub use days::{business_days, business_days_in_year, ranges_overlap};
pub use request::{
    ApproveLeave, CancelLeave, LeaveApproved, LeaveCancelled, LeaveCommand, LeaveEvent,
    LeaveRejected, LeaveRequest, LeaveStatus, LeaveSubmitted, LeaveType, RejectLeave, SubmitLeave,
};
