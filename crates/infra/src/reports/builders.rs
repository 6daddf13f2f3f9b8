use std::collections::HashMap;

use chrono::Utc;

use aura_core::{AggregateId, Money, TenantId};
use aura_tenancy::ReportKind;

use super::{Cell, ReportParams, ReportTable};
use crate::projections::{
    AttendanceFilter, EmployeeReadModel, LeaveFilter, PayrollFilter, ProjectionSet,
};

fn money(m: Money) -> Cell {
    Cell::Number(m.minor() as f64 / 100.0)
}

fn within(params: &ReportParams, date: chrono::NaiveDate) -> bool {
    params.from.is_none_or(|f| date >= f) && params.to.is_none_or(|t| date <= t)
}

/// Snapshot the tenant's read models into a table.
pub fn build_report(
    projections: &ProjectionSet,
    tenant_id: TenantId,
    kind: ReportKind,
    params: &ReportParams,
) -> ReportTable {
    let employees: HashMap<AggregateId, EmployeeReadModel> = projections
        .employees
        .list(tenant_id)
        .into_iter()
        .map(|e| (e.employee_id, e))
        .collect();
    let code = |id: AggregateId| Cell::opt(employees.get(&id).map(|e| e.employee_code.clone()));
    let name = |id: AggregateId| Cell::opt(employees.get(&id).map(|e| e.full_name()));

    let (headers, rows): (Vec<&'static str>, Vec<Vec<Cell>>) = match kind {
        ReportKind::Employees => (
            vec!["Code", "Name", "Email", "Department", "Designation", "Hire date", "Base salary", "Status"],
            projections
                .employees
                .list(tenant_id)
                .into_iter()
                .map(|e| {
                    vec![
                        Cell::text(&e.employee_code),
                        Cell::text(e.full_name()),
                        Cell::text(&e.email),
                        Cell::text(&e.department),
                        Cell::text(&e.designation),
                        Cell::text(e.hire_date.to_string()),
                        money(e.base_salary),
                        Cell::text(if e.is_active() { "active" } else { "terminated" }),
                    ]
                })
                .collect(),
        ),
        ReportKind::Attendance => {
            let filter = AttendanceFilter {
                employee_id: None,
                from: params.from,
                to: params.to,
            };
            (
                vec!["Date", "Code", "Name", "Status", "Check in (UTC)", "Check out (UTC)", "Worked minutes"],
                projections
                    .attendance
                    .list(tenant_id, &filter)
                    .into_iter()
                    .map(|a| {
                        vec![
                            Cell::text(a.date.to_string()),
                            code(a.employee_id),
                            name(a.employee_id),
                            Cell::text(a.status.as_str()),
                            Cell::opt(a.check_in.map(|t| t.format("%H:%M"))),
                            Cell::opt(a.check_out.map(|t| t.format("%H:%M"))),
                            a.worked_minutes.map(Cell::Integer).unwrap_or(Cell::Empty),
                        ]
                    })
                    .collect(),
            )
        }
        ReportKind::Leave => (
            vec!["Code", "Name", "Type", "Start", "End", "Days", "Status", "Note"],
            projections
                .leave
                .list(tenant_id, &LeaveFilter::default())
                .into_iter()
                .filter(|l| within(params, l.start) || within(params, l.end))
                .map(|l| {
                    vec![
                        code(l.employee_id),
                        name(l.employee_id),
                        Cell::text(l.leave_type.as_str()),
                        Cell::text(l.start.to_string()),
                        Cell::text(l.end.to_string()),
                        Cell::Integer(i64::from(l.days)),
                        Cell::text(l.status.as_str()),
                        Cell::opt(l.review_note),
                    ]
                })
                .collect(),
        ),
        ReportKind::Payroll => {
            let filter = PayrollFilter {
                period: params.period,
                employee_id: None,
            };
            (
                vec!["Period", "Code", "Name", "Base", "Allowances", "Unpaid leave", "Gross", "Deductions", "Net", "Status"],
                projections
                    .payroll
                    .list(tenant_id, &filter)
                    .into_iter()
                    .map(|p| {
                        let b = p.breakdown;
                        vec![
                            Cell::text(p.period.to_string()),
                            code(p.employee_id),
                            name(p.employee_id),
                            money(b.base_salary),
                            money(b.allowances),
                            money(b.unpaid_leave_deduction),
                            money(b.gross),
                            money(b.deductions),
                            money(b.net),
                            Cell::text(format!("{:?}", p.status).to_lowercase()),
                        ]
                    })
                    .collect(),
            )
        }
    };

    let company = projections
        .settings
        .get(tenant_id)
        .map(|s| s.settings.company_name)
        .unwrap_or_default();
    let title = if company.is_empty() {
        kind.title().to_string()
    } else {
        format!("{company} - {}", kind.title())
    };

    ReportTable {
        kind,
        title,
        headers,
        rows,
        generated_at: Utc::now(),
    }
}
