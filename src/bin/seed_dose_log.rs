//! Utility to seed simulated dose history for demos and dashboard
//! testing. Creates a demo patient with two medications (if absent) and
//! appends two weeks of mixed confirmed/missed events.

use std::path::PathBuf;

use rand::Rng;
use rusqlite::params;

use medalerta::models::{DoseEvent, DoseSource, DoseStatus, Medication, MedicationCreate, Patient};

fn get_database_path() -> PathBuf {
    std::env::var("MEDALERTA_DATABASE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let mut path = std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.to_path_buf()))
                .unwrap_or_else(|| PathBuf::from("."));

            // Go up from target/release or target/debug to project root
            if path.ends_with("release") || path.ends_with("debug") {
                if let Some(parent) = path.parent() {
                    if let Some(grandparent) = parent.parent() {
                        path = grandparent.to_path_buf();
                    }
                }
            }

            path.push("data");
            std::fs::create_dir_all(&path).ok();
            path.push("medalerta.db");
            path
        })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let db_path = get_database_path();
    println!("Database path: {}", db_path.display());

    let database = medalerta::db::Database::new(&db_path)?;

    database.with_conn(|conn| {
        medalerta::db::migrations::run_migrations(conn)?;
        Ok(())
    })?;

    database.with_conn(|conn| {
        let patient = match Patient::list(conn)?
            .into_iter()
            .find(|p| p.name == "Paciente Demo")
        {
            Some(p) => p,
            None => Patient::create(conn, "Paciente Demo", Some("demo@medalerta.test"))?,
        };
        println!("Patient: {} (id {})", patient.name, patient.id);

        let mut meds = Medication::list_for_patient(conn, patient.id)?;
        if meds.is_empty() {
            for (name, dose, time) in
                [("Ibuprofeno", "400mg", "08:00"), ("Metformina", "850mg", "21:00")]
            {
                meds.push(Medication::create(
                    conn,
                    &MedicationCreate {
                        patient_id: patient.id,
                        name: name.into(),
                        dose: dose.into(),
                        scheduled_time: time.into(),
                    },
                )?);
            }
        }

        let mut rng = rand::thread_rng();
        let mut seeded = 0;
        for med in &meds {
            for days_ago in 1..=14 {
                // Roughly four confirmed doses for every missed one
                let status = if rng.gen_range(0..5) == 0 {
                    DoseStatus::Missed
                } else {
                    DoseStatus::Confirmed
                };
                let event =
                    DoseEvent::append(conn, med.id, status, DoseSource::Simulated, None)?;
                // Backdate the event into the past fortnight
                conn.execute(
                    "UPDATE dose_log SET logged_at = datetime('now', ?1 || ' days') WHERE id = ?2",
                    params![format!("-{}", days_ago), event.id],
                )?;
                seeded += 1;
            }
        }
        println!("Seeded {} simulated dose events across {} medications", seeded, meds.len());
        Ok(())
    })?;

    Ok(())
}
