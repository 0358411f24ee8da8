//! MedAlerta Library
//!
//! Medication reminder core: schedule calculation, alert scheduling and
//! acknowledgment, the dose log, and caregiver sessions.

pub mod build_info;
pub mod db;
pub mod mcp;
pub mod models;
pub mod notify;
pub mod remote;
pub mod schedule;
pub mod session;
pub mod tools;
