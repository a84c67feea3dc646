//! SQL gateway. Plain CRUD statements, no business rules.

pub mod forms;
pub mod trips;
pub mod users;
