use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use aura_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Money, TenantId, UserId};
use aura_events::Event;

use crate::{LineItem, PayBreakdown, PayPeriod, compute_pay};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PayslipStatus {
    #[default]
    Draft,
    Approved,
    Paid,
}

impl PayslipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayslipStatus::Draft => "draft",
            PayslipStatus::Approved => "approved",
            PayslipStatus::Paid => "paid",
        }
    }
}

/// Aggregate root: an employee's payslip for one period.
///
/// # Invariants
/// - One stream per `(tenant, employee, period)` (see [`Payslip::payslip_id`]).
/// - Only drafts are recalculated; approval moves draft → approved; paid is terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payslip {
    id: AggregateId,
    tenant_id: Option<TenantId>,
    employee_id: Option<AggregateId>,
    period: Option<PayPeriod>,
    allowances: Vec<LineItem>,
    deductions: Vec<LineItem>,
    breakdown: Option<PayBreakdown>,
    status: PayslipStatus,
    version: u64,
    created: bool,
}

impl Payslip {
    pub fn empty(id: AggregateId) -> Self {
        Self {
            id,
            tenant_id: None,
            employee_id: None,
            period: None,
            allowances: Vec::new(),
            deductions: Vec::new(),
            breakdown: None,
            status: PayslipStatus::Draft,
            version: 0,
            created: false,
        }
    }

    pub fn payslip_id(tenant_id: TenantId, employee_id: AggregateId, period: PayPeriod) -> AggregateId {
        AggregateId::derived(
            "payroll.payslip",
            tenant_id,
            &[&employee_id.to_string(), &period.to_string()],
        )
    }

    pub fn status(&self) -> PayslipStatus {
        self.status
    }

    pub fn breakdown(&self) -> Option<&PayBreakdown> {
        self.breakdown.as_ref()
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

    fn subject(&self) -> Result<(AggregateId, PayPeriod, Money), DomainError> {
        match (self.employee_id, self.period, self.breakdown) {
            (Some(e), Some(p), Some(b)) => Ok((e, p, b.net)),
            _ => Err(DomainError::invariant("payslip is incomplete")),
        }
    }
}

impl AggregateRoot for Payslip {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratePayslip {
    pub tenant_id: TenantId,
    pub employee_id: AggregateId,
    pub period: PayPeriod,
    pub base_salary: Money,
    pub allowances: Vec<LineItem>,
    pub deductions: Vec<LineItem>,
    pub unpaid_leave_days: u32,
    pub working_days: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Replaces the inputs of a draft; `None` keeps the current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecalculatePayslip {
    pub tenant_id: TenantId,
    pub base_salary: Option<Money>,
    pub allowances: Option<Vec<LineItem>>,
    pub deductions: Option<Vec<LineItem>>,
    pub unpaid_leave_days: Option<u32>,
    pub working_days: Option<u32>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovePayslip {
    pub tenant_id: TenantId,
    pub approved_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkPayslipPaid {
    pub tenant_id: TenantId,
    pub paid_on: NaiveDate,
    pub reference: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayslipCommand {
    Generate(GeneratePayslip),
    Recalculate(RecalculatePayslip),
    Approve(ApprovePayslip),
    MarkPaid(MarkPayslipPaid),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayslipGenerated {
    pub tenant_id: TenantId,
    pub payslip_id: AggregateId,
    pub employee_id: AggregateId,
    pub period: PayPeriod,
    pub allowances: Vec<LineItem>,
    pub deductions: Vec<LineItem>,
    pub breakdown: PayBreakdown,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayslipRecalculated {
    pub tenant_id: TenantId,
    pub payslip_id: AggregateId,
    pub employee_id: AggregateId,
    pub period: PayPeriod,
    pub allowances: Vec<LineItem>,
    pub deductions: Vec<LineItem>,
    pub breakdown: PayBreakdown,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayslipApproved {
    pub tenant_id: TenantId,
    pub payslip_id: AggregateId,
    pub employee_id: AggregateId,
    pub period: PayPeriod,
    pub net: Money,
    pub approved_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayslipPaid {
    pub tenant_id: TenantId,
    pub payslip_id: AggregateId,
    pub employee_id: AggregateId,
    pub period: PayPeriod,
    pub net: Money,
    pub paid_on: NaiveDate,
    pub reference: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayslipEvent {
    Generated(PayslipGenerated),
    Recalculated(PayslipRecalculated),
    Approved(PayslipApproved),
    Paid(PayslipPaid),
}

impl Event for PayslipEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PayslipEvent::Generated(_) => "payroll.payslip.generated",
            PayslipEvent::Recalculated(_) => "payroll.payslip.recalculated",
            PayslipEvent::Approved(_) => "payroll.payslip.approved",
            PayslipEvent::Paid(_) => "payroll.payslip.paid",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PayslipEvent::Generated(e) => e.occurred_at,
            PayslipEvent::Recalculated(e) => e.occurred_at,
            PayslipEvent::Approved(e) => e.occurred_at,
            PayslipEvent::Paid(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Payslip {
    type Command = PayslipCommand;
    type Event = PayslipEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PayslipEvent::Generated(e) => {
                self.tenant_id = Some(e.tenant_id);
                self.employee_id = Some(e.employee_id);
                self.period = Some(e.period);
                self.allowances = e.allowances.clone();
                self.deductions = e.deductions.clone();
                self.breakdown = Some(e.breakdown);
                self.status = PayslipStatus::Draft;
                self.created = true;
            }
            PayslipEvent::Recalculated(e) => {
                self.allowances = e.allowances.clone();
                self.deductions = e.deductions.clone();
                self.breakdown = Some(e.breakdown);
            }
            PayslipEvent::Approved(_) => self.status = PayslipStatus::Approved,
            PayslipEvent::Paid(_) => self.status = PayslipStatus::Paid,
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PayslipCommand::Generate(cmd) => {
                if self.created {
                    return Err(DomainError::conflict(format!(
                        "payslip for {} already exists",
                        cmd.period
                    )));
                }
                let period = PayPeriod::new(cmd.period.year, cmd.period.month)?;
                let breakdown = compute_pay(
                    cmd.base_salary,
                    &cmd.allowances,
                    &cmd.deductions,
                    cmd.unpaid_leave_days,
                    cmd.working_days,
                )?;
                Ok(vec![PayslipEvent::Generated(PayslipGenerated {
                    tenant_id: cmd.tenant_id,
                    payslip_id: self.id,
                    employee_id: cmd.employee_id,
                    period,
                    allowances: cmd.allowances.clone(),
                    deductions: cmd.deductions.clone(),
                    breakdown,
                    occurred_at: cmd.occurred_at,
                })])
            }
            PayslipCommand::Recalculate(cmd) => {
                self.ensure_created(cmd.tenant_id)?;
                if self.status != PayslipStatus::Draft {
                    return Err(DomainError::invariant(format!(
                        "only draft payslips can be recalculated (payslip is {})",
                        self.status.as_str()
                    )));
                }
                let (employee_id, period, _) = self.subject()?;
                let current = self
                    .breakdown
                    .ok_or_else(|| DomainError::invariant("payslip is incomplete"))?;
                let allowances = cmd.allowances.clone().unwrap_or_else(|| self.allowances.clone());
                let deductions = cmd.deductions.clone().unwrap_or_else(|| self.deductions.clone());
                let breakdown = compute_pay(
                    cmd.base_salary.unwrap_or(current.base_salary),
                    &allowances,
                    &deductions,
                    cmd.unpaid_leave_days.unwrap_or(current.unpaid_leave_days),
                    cmd.working_days.unwrap_or(current.working_days),
                )?;
                Ok(vec![PayslipEvent::Recalculated(PayslipRecalculated {
                    tenant_id: cmd.tenant_id,
                    payslip_id: self.id,
                    employee_id,
                    period,
                    allowances,
                    deductions,
                    breakdown,
                    occurred_at: cmd.occurred_at,
                })])
            }
            PayslipCommand::Approve(cmd) => {
                self.ensure_created(cmd.tenant_id)?;
                if self.status != PayslipStatus::Draft {
                    return Err(DomainError::invariant(format!(
                        "payslip is already {}",
                        self.status.as_str()
                    )));
                }
                let (employee_id, period, net) = self.subject()?;
                Ok(vec![PayslipEvent::Approved(PayslipApproved {
                    tenant_id: cmd.tenant_id,
                    payslip_id: self.id,
                    employee_id,
                    period,
                    net,
                    approved_by: cmd.approved_by,
                    occurred_at: cmd.occurred_at,
                })])
            }
            PayslipCommand::MarkPaid(cmd) => {
                self.ensure_created(cmd.tenant_id)?;
                match self.status {
                    PayslipStatus::Approved => {}
                    PayslipStatus::Draft => {
                        return Err(DomainError::invariant("payslip must be approved before payment"));
                    }
                    PayslipStatus::Paid => return Err(DomainError::invariant("payslip is already paid")),
                }
                let (employee_id, period, net) = self.subject()?;
                Ok(vec![PayslipEvent::Paid(PayslipPaid {
                    tenant_id: cmd.tenant_id,
                    payslip_id: self.id,
                    employee_id,
                    period,
                    net,
                    paid_on: cmd.paid_on,
                    reference: cmd.reference.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        tenant_id: TenantId,
        slip: Payslip,
    }

    impl Fixture {
        fn run(&mut self, cmd: PayslipCommand) -> Result<Vec<PayslipEvent>, DomainError> {
            let events = self.slip.handle(&cmd)?;
            for ev in &events {
                self.slip.apply(ev);
            }
            Ok(events)
        }

        fn approve(&mut self) -> Result<Vec<PayslipEvent>, DomainError> {
            self.run(PayslipCommand::Approve(ApprovePayslip {
                tenant_id: self.tenant_id,
                approved_by: UserId::new(),
                occurred_at: Utc::now(),
            }))
        }

        fn recalc(&mut self, base: i64) -> Result<Vec<PayslipEvent>, DomainError> {
            self.run(PayslipCommand::Recalculate(RecalculatePayslip {
                tenant_id: self.tenant_id,
                base_salary: Some(Money::from_minor(base)),
                allowances: None,
                deductions: None,
                unpaid_leave_days: None,
                working_days: None,
                occurred_at: Utc::now(),
            }))
        }

        fn pay(&mut self) -> Result<Vec<PayslipEvent>, DomainError> {
            self.run(PayslipCommand::MarkPaid(MarkPayslipPaid {
                tenant_id: self.tenant_id,
                paid_on: NaiveDate::from_ymd_opt(2024, 5, 25).unwrap(),
                reference: Some("BATCH-0524".to_string()),
                occurred_at: Utc::now(),
            }))
        }
    }

    fn generate(tenant_id: TenantId, employee_id: AggregateId, period: PayPeriod) -> PayslipCommand {
        PayslipCommand::Generate(GeneratePayslip {
            tenant_id,
            employee_id,
            period,
            base_salary: Money::from_minor(220_000),
            allowances: vec![LineItem::new("Transport", Money::from_minor(10_000))],
            deductions: vec![LineItem::new("Tax", Money::from_minor(30_000))],
            unpaid_leave_days: 2,
            working_days: 22,
            occurred_at: Utc::now(),
        })
    }

    fn generated() -> Fixture {
        let tenant_id = TenantId::new();
        let employee_id = AggregateId::new();
        let period = PayPeriod::new(2024, 5).unwrap();
        let mut f = Fixture {
            tenant_id,
            slip: Payslip::empty(Payslip::payslip_id(tenant_id, employee_id, period)),
        };
        f.run(generate(tenant_id, employee_id, period)).unwrap();
        f
    }

    #[test]
    fn generate_computes_breakdown() {
        let f = generated();
        let b = f.slip.breakdown().unwrap();
        assert_eq!(b.unpaid_leave_deduction, Money::from_minor(20_000));
        assert_eq!(b.gross, Money::from_minor(210_000));
        assert_eq!(b.net, Money::from_minor(180_000));
        assert_eq!(f.slip.status(), PayslipStatus::Draft);
    }

    #[test]
    fn second_generate_for_same_period_conflicts() {
        let mut f = generated();
        let period = PayPeriod::new(2024, 5).unwrap();
        let err = f.run(generate(f.tenant_id, AggregateId::new(), period)).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn recalculate_only_while_draft() {
        let mut f = generated();
        f.recalc(242_000).unwrap();
        assert_eq!(f.slip.breakdown().unwrap().base_salary, Money::from_minor(242_000));
        // Line items survive a base-only recalculation.
        assert_eq!(f.slip.breakdown().unwrap().allowances, Money::from_minor(10_000));

        f.approve().unwrap();
        assert!(matches!(f.recalc(1).unwrap_err(), DomainError::InvariantViolation(_)));
    }

    #[test]
    fn lifecycle_draft_approved_paid() {
        let mut f = generated();
        assert!(f.pay().is_err());
        let events = f.approve().unwrap();
        assert!(matches!(&events[0], PayslipEvent::Approved(e) if e.net == Money::from_minor(180_000)));
        f.pay().unwrap();
        assert_eq!(f.slip.status(), PayslipStatus::Paid);
        assert!(f.pay().is_err());
        assert!(f.approve().is_err());
    }

    #[test]
    fn payslip_ids_are_per_period() {
        let t = TenantId::new();
        let e = AggregateId::new();
        let may = Payslip::payslip_id(t, e, PayPeriod::new(2024, 5).unwrap());
        let june = Payslip::payslip_id(t, e, PayPeriod::new(2024, 6).unwrap());
        assert_ne!(may, june);
        assert_eq!(may, Payslip::payslip_id(t, e, PayPeriod::new(2024, 5).unwrap()));
    }
}
