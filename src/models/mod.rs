//! Data models
//!
//! Rust structs representing database entities.

mod caregiver;
mod dose_event;
mod medication;
mod patient;

pub use caregiver::{hash_access_code, Caregiver};
pub use dose_event::{DoseEvent, DoseSource, DoseStats, DoseStatus};
pub use medication::{Medication, MedicationCreate, MedicationUpdate};
pub use patient::Patient;
