//! Infrastructure layer: event storage, command dispatch, read models,
//! report rendering, mail delivery and the report scheduler.

pub mod command_dispatcher;
pub mod event_store;
pub mod mail;
pub mod projections;
pub mod read_model;
pub mod reports;
pub mod scheduler;
pub mod workers;
