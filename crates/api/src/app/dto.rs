//! Request bodies, query strings and small parsing helpers.

use axum::response::Response;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use aura_attendance::AttendanceStatus;
use aura_core::{AggregateId, Money, TenantId, UserId};
use aura_leave::{LeaveStatus, LeaveType};
use aura_payroll::{LineItem, PayPeriod};
use aura_support::TicketPriority;
use aura_tenancy::{Plan, ReportFormat, ReportKind, Subscription};

use crate::app::errors;

// -------------------------
// Auth / tenants / users
// -------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Omitted for system administrators.
    pub tenant_slug: Option<String>,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct NewAccount {
    pub email: String,
    pub display_name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ProvisionTenantRequest {
    pub name: String,
    pub slug: String,
    pub contact_email: String,
    pub subscription: Option<SubscriptionRequest>,
    pub admin: NewAccount,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionRequest {
    pub plan: Plan,
    pub seats: u32,
    pub renews_on: Option<NaiveDate>,
}

impl From<SubscriptionRequest> for Subscription {
    fn from(value: SubscriptionRequest) -> Self {
        Subscription {
            plan: value.plan,
            seats: value.seats,
            renews_on: value.renews_on,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateTenantRequest {
    pub name: Option<String>,
    pub contact_email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReasonRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnnouncementRequest {
    /// Omitted: every active tenant.
    pub tenant_id: Option<TenantId>,
    pub title: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub display_name: String,
    pub password: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub employee_id: Option<AggregateId>,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct PermissionCheckQuery {
    pub check: Option<String>,
}

// -------------------------
// Employees
// -------------------------

#[derive(Debug, Deserialize)]
pub struct HireEmployeeRequest {
    pub employee_code: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub designation: String,
    pub hire_date: NaiveDate,
    /// Monthly, in minor units.
    pub base_salary: Money,
}

#[derive(Debug, Deserialize)]
pub struct UpdateEmployeeRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub department: Option<String>,
    pub designation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeSalaryRequest {
    pub base_salary: Money,
    pub effective_from: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct TerminateEmployeeRequest {
    pub termination_date: NaiveDate,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LinkUserRequest {
    pub user_id: UserId,
}

#[derive(Debug, Default, Deserialize)]
pub struct EmployeeListQuery {
    pub status: Option<String>,
    pub department: Option<String>,
}

// -------------------------
// Attendance
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ClockRequest {
    pub employee_id: Option<AggregateId>,
    /// Administrators may record a past time; self-service always uses now.
    pub at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MarkAttendanceRequest {
    pub employee_id: AggregateId,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CorrectAttendanceRequest {
    pub employee_id: AggregateId,
    pub date: NaiveDate,
    pub check_in: Option<DateTime<Utc>>,
    pub check_out: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AttendanceQuery {
    pub employee_id: Option<AggregateId>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

// -------------------------
// Leave
// -------------------------

#[derive(Debug, Deserialize)]
pub struct SubmitLeaveRequest {
    pub employee_id: Option<AggregateId>,
    pub leave_type: LeaveType,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewRequest {
    pub note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LeaveQuery {
    pub employee_id: Option<AggregateId>,
    pub status: Option<LeaveStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BalanceQuery {
    pub employee_id: Option<AggregateId>,
    pub year: Option<i32>,
}

// -------------------------
// Payroll
// -------------------------

#[derive(Debug, Deserialize)]
pub struct GeneratePayrollRequest {
    pub period: String,
    /// Omitted: every active employee.
    pub employee_ids: Option<Vec<AggregateId>>,
    #[serde(default)]
    pub allowances: Vec<LineItem>,
    #[serde(default)]
    pub deductions: Vec<LineItem>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecalculatePayslipRequest {
    pub base_salary: Option<Money>,
    pub allowances: Option<Vec<LineItem>>,
    pub deductions: Option<Vec<LineItem>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PayPayslipRequest {
    pub paid_on: Option<NaiveDate>,
    pub reference: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PayrollQuery {
    pub period: Option<String>,
    pub employee_id: Option<AggregateId>,
}

// -------------------------
// Reports
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub format: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub period: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateScheduleRequest {
    pub name: String,
    /// Seconds-first cron expression, evaluated in UTC.
    pub cron: String,
    pub kind: String,
    pub format: String,
    pub recipients: Vec<String>,
}

// -------------------------
// Tickets
// -------------------------

#[derive(Debug, Deserialize)]
pub struct OpenTicketRequest {
    pub subject: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: TicketPriority,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub body: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResolveRequest {
    pub resolution: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TicketQuery {
    #[serde(default)]
    pub mine: bool,
}

// -------------------------
// Helpers
// -------------------------

pub fn parse_id(raw: &str, what: &str) -> Result<AggregateId, Response> {
    raw.parse()
        .map_err(|_| errors::bad_request(format!("invalid {what} id")))
}

pub fn parse_user_id(raw: &str) -> Result<UserId, Response> {
    raw.parse().map_err(|_| errors::bad_request("invalid user id"))
}

pub fn parse_tenant_id(raw: &str) -> Result<TenantId, Response> {
    raw.parse().map_err(|_| errors::bad_request("invalid tenant id"))
}

pub fn parse_period(raw: &str) -> Result<PayPeriod, Response> {
    raw.parse().map_err(|e: aura_core::DomainError| errors::bad_request(e.to_string()))
}

pub fn parse_kind(raw: &str) -> Result<ReportKind, Response> {
    raw.parse().map_err(|e: aura_core::DomainError| errors::bad_request(e.to_string()))
}

pub fn parse_format(raw: Option<&str>) -> Result<ReportFormat, Response> {
    match raw {
        None => Ok(ReportFormat::Csv),
        Some(f) => f.parse().map_err(|e: aura_core::DomainError| errors::bad_request(e.to_string())),
    }
}
