use core::str::FromStr;

use serde::{Deserialize, Serialize};

use aura_core::{DomainError, DomainResult, Money, require_non_blank};

/// Calendar month a payslip covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PayPeriod {
    pub year: i32,
    pub month: u32,
}

impl PayPeriod {
    pub fn new(year: i32, month: u32) -> DomainResult<Self> {
        if !(1..=12).contains(&month) {
            return Err(DomainError::validation("month must be within 1..=12"));
        }
        if !(2000..=2100).contains(&year) {
            return Err(DomainError::validation("year out of range"));
        }
        Ok(Self { year, month })
    }

    pub fn first_day(&self) -> Option<chrono::NaiveDate> {
        chrono::NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn last_day(&self) -> Option<chrono::NaiveDate> {
        let (y, m) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        chrono::NaiveDate::from_ymd_opt(y, m, 1)?.pred_opt()
    }
}

impl core::fmt::Display for PayPeriod {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Parses `YYYY-MM`.
impl FromStr for PayPeriod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || DomainError::validation(format!("invalid pay period '{s}', expected YYYY-MM"));
        let (y, m) = s.trim().split_once('-').ok_or_else(bad)?;
        let year = y.parse::<i32>().map_err(|_| bad())?;
        let month = m.parse::<u32>().map_err(|_| bad())?;
        PayPeriod::new(year, month)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub label: String,
    pub amount: Money,
}

impl LineItem {
    pub fn new(label: impl Into<String>, amount: Money) -> Self {
        Self {
            label: label.into(),
            amount,
        }
    }

    fn validate(&self) -> DomainResult<()> {
        require_non_blank("label", &self.label)?;
        if self.amount.is_negative() {
            return Err(DomainError::validation(format!(
                "line item '{}' has a negative amount",
                self.label
            )));
        }
        Ok(())
    }
}

/// Result of [`compute_pay`]; stored verbatim on the payslip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayBreakdown {
    pub base_salary: Money,
    pub allowances: Money,
    pub unpaid_leave_days: u32,
    pub working_days: u32,
    pub unpaid_leave_deduction: Money,
    pub gross: Money,
    pub deductions: Money,
    pub net: Money,
}

/// Monthly pay for one employee.
///
/// - unpaid-leave deduction = `base * unpaid_days / working_days` (rounded down),
///   with `unpaid_days` capped at `working_days`
/// - gross = base + allowances − unpaid-leave deduction
/// - net = gross − deductions, rejected when negative
pub fn compute_pay(
    base_salary: Money,
    allowances: &[LineItem],
    deductions: &[LineItem],
    unpaid_leave_days: u32,
    working_days: u32,
) -> DomainResult<PayBreakdown> {
    if base_salary.is_negative() {
        return Err(DomainError::validation("base salary cannot be negative"));
    }
    if working_days == 0 {
        return Err(DomainError::validation("working days must be positive"));
    }
    for item in allowances.iter().chain(deductions) {
        item.validate()?;
    }

    let unpaid_leave_days = unpaid_leave_days.min(working_days);
    let allowances_total = Money::sum(allowances.iter().map(|i| &i.amount))?;
    let deductions_total = Money::sum(deductions.iter().map(|i| &i.amount))?;
    let unpaid_leave_deduction = base_salary.prorate(unpaid_leave_days, working_days)?;

    let gross = base_salary
        .checked_add(allowances_total)?
        .checked_sub(unpaid_leave_deduction)?;
    let net = gross.checked_sub(deductions_total)?;
    if net.is_negative() {
        return Err(DomainError::invariant(format!(
            "deductions ({deductions_total}) exceed gross pay ({gross})"
        )));
    }

    Ok(PayBreakdown {
        base_salary,
        allowances: allowances_total,
        unpaid_leave_days,
        working_days,
        unpaid_leave_deduction,
        gross,
        deductions: deductions_total,
        net,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn m(minor: i64) -> Money {
        Money::from_minor(minor)
    }

    #[test]
    fn straight_salary() {
        let pay = compute_pay(m(300_000), &[], &[], 0, 22).unwrap();
        assert_eq!(pay.gross, m(300_000));
        assert_eq!(pay.net, m(300_000));
    }

    #[test]
    fn unpaid_leave_is_prorated_and_rounded_down() {
        // 100000 * 3 / 22 = 13636.36.. -> 13636
        let pay = compute_pay(
            m(100_000),
            &[LineItem::new("Housing", m(5_000))],
            &[LineItem::new("Tax", m(10_000))],
            3,
            22,
        )
        .unwrap();
        assert_eq!(pay.unpaid_leave_deduction, m(13_636));
        assert_eq!(pay.gross, m(91_364));
        assert_eq!(pay.net, m(81_364));
    }

    #[test]
    fn unpaid_days_are_capped() {
        let pay = compute_pay(m(100_000), &[], &[], 30, 22).unwrap();
        assert_eq!(pay.unpaid_leave_days, 22);
        assert_eq!(pay.net, Money::ZERO);
    }

    #[test]
    fn negative_net_is_rejected() {
        let err = compute_pay(m(1_000), &[], &[LineItem::new("Loan", m(1_001))], 0, 22).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn bad_inputs_are_rejected() {
        assert!(compute_pay(m(1_000), &[], &[], 0, 0).is_err());
        assert!(compute_pay(m(-1), &[], &[], 0, 22).is_err());
        assert!(compute_pay(m(1_000), &[LineItem::new("Bonus", m(-5))], &[], 0, 22).is_err());
        assert!(compute_pay(m(1_000), &[LineItem::new(" ", m(5))], &[], 0, 22).is_err());
    }

    #[test]
    fn period_parsing_and_bounds() {
        let p: PayPeriod = "2024-02".parse().unwrap();
        assert_eq!(p.to_string(), "2024-02");
        assert_eq!(p.last_day(), chrono::NaiveDate::from_ymd_opt(2024, 2, 29));
        assert!("2024-13".parse::<PayPeriod>().is_err());
        assert!("May 2024".parse::<PayPeriod>().is_err());
        let dec = PayPeriod::new(2023, 12).unwrap();
        assert_eq!(dec.last_day(), chrono::NaiveDate::from_ymd_opt(2023, 12, 31));
    }

    proptest! {
        #[test]
        fn net_identity_holds(
            base in 0i64..10_000_000,
            allowance in 0i64..1_000_000,
            deduction in 0i64..1_000_000,
            unpaid in 0u32..40,
            working in 1u32..31,
        ) {
            let allowances = [LineItem::new("A", m(allowance))];
            let deductions = [LineItem::new("D", m(deduction))];
            match compute_pay(m(base), &allowances, &deductions, unpaid, working) {
                Ok(pay) => {
                    prop_assert_eq!(pay.gross.minor(), base + allowance - pay.unpaid_leave_deduction.minor());
                    prop_assert_eq!(pay.net.minor(), pay.gross.minor() - deduction);
                    prop_assert!(!pay.net.is_negative());
                    prop_assert!(pay.unpaid_leave_deduction.minor() <= base);
                }
                Err(_) => {
                    let cap = unpaid.min(working) as i64;
                    let gross = base + allowance - base * cap / working as i64;
                    prop_assert!(gross - deduction < 0);
                }
            }
        }
    }
}
