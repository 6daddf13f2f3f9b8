//! Employees domain module (event-sourced employee records).
//!
//! Pure domain logic: no IO, no HTTP, no storage.

pub mod employee;

pub use employee::{
    ChangeSalary, Employee, EmployeeCommand, EmployeeEvent, EmployeeHired, EmployeeProfile,
    EmployeeStatus, EmployeeTerminated, EmployeeUpdated, HireEmployee, LinkUser, SalaryChanged,
    TerminateEmployee, UpdateEmployee, UserLinked,
};
