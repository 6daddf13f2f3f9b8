use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use aura_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Money, TenantId, UserId, require_email, require_non_blank};
use aura_events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmployeeStatus {
    #[default]
    Active,
    Terminated,
}

/// Editable personal and organisational details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EmployeeProfile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub department: String,
    pub designation: String,
}

impl EmployeeProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    fn normalized(&self) -> Self {
        Self {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            department: self.department.trim().to_string(),
            designation: self.designation.trim().to_string(),
        }
    }

    fn validate(&self) -> Result<(), DomainError> {
        require_non_blank("first_name", &self.first_name)?;
        require_non_blank("last_name", &self.last_name)?;
        require_email("email", &self.email)?;
        Ok(())
    }
}

/// Aggregate root: one person employed by a tenant.
///
/// # Invariants
/// - Base salary is never negative.
/// - Termination is terminal and dated on/after the hire date.
/// - At most one linked login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Employee {
    id: AggregateId,
    tenant_id: Option<TenantId>,
    employee_code: String,
    profile: EmployeeProfile,
    hire_date: Option<NaiveDate>,
    base_salary: Money,
    status: EmployeeStatus,
    termination_date: Option<NaiveDate>,
    user_id: Option<UserId>,
    version: u64,
    created: bool,
}

impl Employee {
    pub fn empty(id: AggregateId) -> Self {
        Self {
            id,
            tenant_id: None,
            employee_code: String::new(),
            profile: EmployeeProfile::default(),
            hire_date: None,
            base_salary: Money::ZERO,
            status: EmployeeStatus::Active,
            termination_date: None,
            user_id: None,
            version: 0,
            created: false,
        }
    }

    pub fn employee_code(&self) -> &str {
        &self.employee_code
    }

    pub fn profile(&self) -> &EmployeeProfile {
        &self.profile
    }

    pub fn base_salary(&self) -> Money {
        self.base_salary
    }

    pub fn status(&self) -> EmployeeStatus {
        self.status
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn is_active(&self) -> bool {
        self.created && self.status == EmployeeStatus::Active
    }

    fn ensure_active(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.status == EmployeeStatus::Terminated {
            return Err(DomainError::invariant("employee is terminated"));
        }
        Ok(())
    }
}

impl AggregateRoot for Employee {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HireEmployee {
    pub tenant_id: TenantId,
    pub employee_id: AggregateId,
    pub employee_code: String,
    pub profile: EmployeeProfile,
    pub hire_date: NaiveDate,
    pub base_salary: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateEmployee {
    pub tenant_id: TenantId,
    pub employee_id: AggregateId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub department: Option<String>,
    pub designation: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSalary {
    pub tenant_id: TenantId,
    pub employee_id: AggregateId,
    pub base_salary: Money,
    pub effective_from: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkUser {
    pub tenant_id: TenantId,
    pub employee_id: AggregateId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminateEmployee {
    pub tenant_id: TenantId,
    pub employee_id: AggregateId,
    pub termination_date: NaiveDate,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmployeeCommand {
    Hire(HireEmployee),
    Update(UpdateEmployee),
    ChangeSalary(ChangeSalary),
    LinkUser(LinkUser),
    Terminate(TerminateEmployee),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeHired {
    pub tenant_id: TenantId,
    pub employee_id: AggregateId,
    pub employee_code: String,
    pub profile: EmployeeProfile,
    pub hire_date: NaiveDate,
    pub base_salary: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeUpdated {
    pub tenant_id: TenantId,
    pub employee_id: AggregateId,
    pub profile: EmployeeProfile,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryChanged {
    pub tenant_id: TenantId,
    pub employee_id: AggregateId,
    pub previous: Money,
    pub base_salary: Money,
    pub effective_from: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLinked {
    pub tenant_id: TenantId,
    pub employee_id: AggregateId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeTerminated {
    pub tenant_id: TenantId,
    pub employee_id: AggregateId,
    pub termination_date: NaiveDate,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmployeeEvent {
    Hired(EmployeeHired),
    Updated(EmployeeUpdated),
    SalaryChanged(SalaryChanged),
    UserLinked(UserLinked),
    Terminated(EmployeeTerminated),
}

impl Event for EmployeeEvent {
    fn event_type(&self) -> &'static str {
        match self {
            EmployeeEvent::Hired(_) => "employees.employee.hired",
            EmployeeEvent::Updated(_) => "employees.employee.updated",
            EmployeeEvent::SalaryChanged(_) => "employees.employee.salary_changed",
            EmployeeEvent::UserLinked(_) => "employees.employee.user_linked",
            EmployeeEvent::Terminated(_) => "employees.employee.terminated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            EmployeeEvent::Hired(e) => e.occurred_at,
            EmployeeEvent::Updated(e) => e.occurred_at,
            EmployeeEvent::SalaryChanged(e) => e.occurred_at,
            EmployeeEvent::UserLinked(e) => e.occurred_at,
            EmployeeEvent::Terminated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Employee {
    type Command = EmployeeCommand;
    type Event = EmployeeEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            EmployeeEvent::Hired(e) => {
                self.id = e.employee_id;
                self.tenant_id = Some(e.tenant_id);
                self.employee_code = e.employee_code.clone();
                self.profile = e.profile.clone();
                self.hire_date = Some(e.hire_date);
                self.base_salary = e.base_salary;
                self.status = EmployeeStatus::Active;
                self.created = true;
            }
            EmployeeEvent::Updated(e) => self.profile = e.profile.clone(),
            EmployeeEvent::SalaryChanged(e) => self.base_salary = e.base_salary,
            EmployeeEvent::UserLinked(e) => self.user_id = Some(e.user_id),
            EmployeeEvent::Terminated(e) => {
                self.status = EmployeeStatus::Terminated;
                self.termination_date = Some(e.termination_date);
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            EmployeeCommand::Hire(cmd) => self.handle_hire(cmd),
            EmployeeCommand::Update(cmd) => self.handle_update(cmd),
            EmployeeCommand::ChangeSalary(cmd) => self.handle_change_salary(cmd),
            EmployeeCommand::LinkUser(cmd) => self.handle_link_user(cmd),
            EmployeeCommand::Terminate(cmd) => self.handle_terminate(cmd),
        }
    }
}

impl Employee {
    fn handle_hire(&self, cmd: &HireEmployee) -> Result<Vec<EmployeeEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("employee already exists"));
        }
        let employee_code = cmd.employee_code.trim().to_string();
        require_non_blank("employee_code", &employee_code)?;
        let profile = cmd.profile.normalized();
        profile.validate()?;
        if cmd.base_salary.is_negative() {
            return Err(DomainError::validation("base salary cannot be negative"));
        }

        Ok(vec![EmployeeEvent::Hired(EmployeeHired {
            tenant_id: cmd.tenant_id,
            employee_id: cmd.employee_id,
            employee_code,
            profile,
            hire_date: cmd.hire_date,
            base_salary: cmd.base_salary,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateEmployee) -> Result<Vec<EmployeeEvent>, DomainError> {
        self.ensure_active(cmd.tenant_id)?;

        let pick = |new: &Option<String>, old: &String| new.clone().unwrap_or_else(|| old.clone());
        let profile = EmployeeProfile {
            first_name: pick(&cmd.first_name, &self.profile.first_name),
            last_name: pick(&cmd.last_name, &self.profile.last_name),
            email: pick(&cmd.email, &self.profile.email),
            department: pick(&cmd.department, &self.profile.department),
            designation: pick(&cmd.designation, &self.profile.designation),
        }
        .normalized();
        profile.validate()?;

        if profile == self.profile {
            return Ok(vec![]);
        }

        Ok(vec![EmployeeEvent::Updated(EmployeeUpdated {
            tenant_id: cmd.tenant_id,
            employee_id: cmd.employee_id,
            profile,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_salary(&self, cmd: &ChangeSalary) -> Result<Vec<EmployeeEvent>, DomainError> {
        self.ensure_active(cmd.tenant_id)?;
        if cmd.base_salary.is_negative() {
            return Err(DomainError::validation("base salary cannot be negative"));
        }
        if cmd.base_salary == self.base_salary {
            return Ok(vec![]);
        }

        Ok(vec![EmployeeEvent::SalaryChanged(SalaryChanged {
            tenant_id: cmd.tenant_id,
            employee_id: cmd.employee_id,
            previous: self.base_salary,
            base_salary: cmd.base_salary,
            effective_from: cmd.effective_from,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_link_user(&self, cmd: &LinkUser) -> Result<Vec<EmployeeEvent>, DomainError> {
        self.ensure_active(cmd.tenant_id)?;
        match self.user_id {
            Some(existing) if existing == cmd.user_id => Ok(vec![]),
            Some(_) => Err(DomainError::conflict("employee already has a linked user")),
            None => Ok(vec![EmployeeEvent::UserLinked(UserLinked {
                tenant_id: cmd.tenant_id,
                employee_id: cmd.employee_id,
                user_id: cmd.user_id,
                occurred_at: cmd.occurred_at,
            })]),
        }
    }

    fn handle_terminate(&self, cmd: &TerminateEmployee) -> Result<Vec<EmployeeEvent>, DomainError> {
        self.ensure_active(cmd.tenant_id)?;
        if self.hire_date.is_some_and(|hired| cmd.termination_date < hired) {
            return Err(DomainError::validation("termination date precedes hire date"));
        }

        Ok(vec![EmployeeEvent::Terminated(EmployeeTerminated {
            tenant_id: cmd.tenant_id,
            employee_id: cmd.employee_id,
            termination_date: cmd.termination_date,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn hire_cmd(tenant_id: TenantId, employee_id: AggregateId) -> EmployeeCommand {
        EmployeeCommand::Hire(HireEmployee {
            tenant_id,
            employee_id,
            employee_code: " E-001 ".to_string(),
            profile: EmployeeProfile {
                first_name: "Grace".to_string(),
                last_name: "Hopper".to_string(),
                email: "Grace@Acme.io".to_string(),
                department: "Engineering".to_string(),
                designation: "Rear Admiral".to_string(),
            },
            hire_date: date(2023, 1, 9),
            base_salary: Money::from_minor(500_000),
            occurred_at: Utc::now(),
        })
    }

    fn hired() -> (TenantId, Employee) {
        let tenant_id = TenantId::new();
        let id = AggregateId::new();
        let mut emp = Employee::empty(id);
        aura_events::execute(&mut emp, &hire_cmd(tenant_id, id)).unwrap();
        (tenant_id, emp)
    }

    #[test]
    fn hire_normalises_input() {
        let (_, emp) = hired();
        assert_eq!(emp.employee_code(), "E-001");
        assert_eq!(emp.profile().email, "grace@acme.io");
        assert_eq!(emp.profile().full_name(), "Grace Hopper");
        assert!(emp.is_active());
    }

    #[test]
    fn negative_salary_rejected() {
        let (tenant_id, emp) = hired();
        let err = emp
            .handle(&EmployeeCommand::ChangeSalary(ChangeSalary {
                tenant_id,
                employee_id: *emp.id(),
                base_salary: Money::from_minor(-1),
                effective_from: date(2024, 1, 1),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn salary_change_records_previous_amount() {
        let (tenant_id, emp) = hired();
        let events = emp
            .handle(&EmployeeCommand::ChangeSalary(ChangeSalary {
                tenant_id,
                employee_id: *emp.id(),
                base_salary: Money::from_minor(550_000),
                effective_from: date(2024, 1, 1),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        match &events[0] {
            EmployeeEvent::SalaryChanged(e) => {
                assert_eq!(e.previous, Money::from_minor(500_000));
                assert_eq!(e.base_salary, Money::from_minor(550_000));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn partial_update_keeps_other_fields() {
        let (tenant_id, mut emp) = hired();
        let events = emp
            .handle(&EmployeeCommand::Update(UpdateEmployee {
                tenant_id,
                employee_id: *emp.id(),
                first_name: None,
                last_name: None,
                email: None,
                department: Some("Research".to_string()),
                designation: None,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        emp.apply(&events[0]);
        assert_eq!(emp.profile().department, "Research");
        assert_eq!(emp.profile().first_name, "Grace");
    }

    #[test]
    fn termination_is_terminal_and_dated_after_hire() {
        let (tenant_id, mut emp) = hired();
        let terminate = |on| {
            EmployeeCommand::Terminate(TerminateEmployee {
                tenant_id,
                employee_id: AggregateId::new(),
                termination_date: on,
                reason: None,
                occurred_at: Utc::now(),
            })
        };

        assert!(emp.handle(&terminate(date(2022, 12, 31))).is_err());

        let events = emp.handle(&terminate(date(2024, 6, 30))).unwrap();
        emp.apply(&events[0]);
        assert_eq!(emp.status(), EmployeeStatus::Terminated);

        let err = emp.handle(&terminate(date(2024, 7, 1))).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn link_user_is_exclusive() {
        let (tenant_id, mut emp) = hired();
        let user_id = UserId::new();
        let link = |user_id| {
            EmployeeCommand::LinkUser(LinkUser {
                tenant_id,
                employee_id: AggregateId::new(),
                user_id,
                occurred_at: Utc::now(),
            })
        };

        let events = emp.handle(&link(user_id)).unwrap();
        emp.apply(&events[0]);
        assert_eq!(emp.user_id(), Some(user_id));
        assert!(emp.handle(&link(user_id)).unwrap().is_empty());
        assert!(matches!(
            emp.handle(&link(UserId::new())).unwrap_err(),
            DomainError::Conflict(_)
        ));
    }

    #[test]
    fn other_tenant_cannot_touch_employee() {
        let (_, emp) = hired();
        let err = emp
            .handle(&EmployeeCommand::Terminate(TerminateEmployee {
                tenant_id: TenantId::new(),
                employee_id: *emp.id(),
                termination_date: date(2024, 1, 1),
                reason: None,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    proptest::proptest! {
        #[test]
        fn salary_accepted_iff_non_negative(minor in -1_000_000i64..1_000_000) {
            let (tenant_id, emp) = hired();
            let result = emp.handle(&EmployeeCommand::ChangeSalary(ChangeSalary {
                tenant_id,
                employee_id: *emp.id(),
                base_salary: Money::from_minor(minor),
                effective_from: date(2024, 1, 1),
                occurred_at: Utc::now(),
            }));
            proptest::prop_assert_eq!(result.is_ok(), minor >= 0);
        }
    }
}
