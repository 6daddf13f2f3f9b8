//! Attendance domain module: one record per employee per calendar day.

pub mod record;

pub use record::{
    AttendanceCommand, AttendanceCorrected, AttendanceEvent, AttendanceMarked, AttendanceRecord,
    AttendanceStatus, CheckIn, CheckOut, CheckedIn, CheckedOut, CorrectAttendance, MarkAttendance,
    worked_minutes,
};
