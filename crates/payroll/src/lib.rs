//! Payroll domain module: payslips and pay computation.
//!
//! All arithmetic is in integer minor units (`Money`); rounding is toward zero.

pub mod pay;
pub mod payslip;

pub use pay::{LineItem, PayBreakdown, PayPeriod, compute_pay};
pub use payslip::{
    ApprovePayslip, GeneratePayslip, MarkPayslipPaid, Payslip, PayslipApproved, PayslipCommand,
    PayslipEvent, PayslipGenerated, PayslipPaid, PayslipRecalculated, PayslipStatus,
    RecalculatePayslip,
};
