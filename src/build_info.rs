//! Compile-time build metadata, embedded by build.rs.

use serde::Serialize;

/// Package version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name from Cargo.toml
pub const NAME: &str = env!("CARGO_PKG_NAME");

const BUILD_NUMBER_RAW: &str = match option_env!("MEDALERTA_BUILD_NUMBER") {
    Some(s) => s,
    None => "0",
};

const BUILD_TIMESTAMP: &str = match option_env!("MEDALERTA_BUILD_TIMESTAMP") {
    Some(s) => s,
    None => "unknown",
};

/// Snapshot of the build metadata, suitable for status responses
#[derive(Debug, Clone, Serialize)]
pub struct BuildInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub build_number: u64,
    pub build_timestamp: &'static str,
    pub description: &'static str,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self {
            name: NAME,
            version: VERSION,
            build_number: BUILD_NUMBER_RAW.parse().unwrap_or(0),
            build_timestamp: BUILD_TIMESTAMP,
            description: env!("CARGO_PKG_DESCRIPTION"),
        }
    }
}

/// Startup banner, written to stderr so stdout stays clean for MCP
pub fn print_startup_banner() {
    let info = BuildInfo::current();
    eprintln!("==============================================");
    eprintln!("  MedAlerta Reminder Server");
    eprintln!("  v{} (build {}, {})", info.version, info.build_number, info.build_timestamp);
    eprintln!("==============================================");
}
