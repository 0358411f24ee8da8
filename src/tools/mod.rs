//! MedAlerta tools module
//!
//! Tool implementations behind the MCP surface.

pub mod caregivers;
pub mod doses;
pub mod medications;
pub mod patients;
pub mod status;
