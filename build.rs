//! Embeds a monotonically increasing build number and a UTC timestamp
//! into the binary, surfaced by the status tool.

use std::fs;
use std::path::Path;

fn main() {
    println!("cargo:rerun-if-changed=src");

    let counter = Path::new("build_number.txt");
    let previous: u64 = fs::read_to_string(counter)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(0);
    let build = previous + 1;
    if let Err(e) = fs::write(counter, build.to_string()) {
        println!("cargo:warning=Could not persist build number: {}", e);
    }

    let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
    println!("cargo:rustc-env=MEDALERTA_BUILD_NUMBER={}", build);
    println!("cargo:rustc-env=MEDALERTA_BUILD_TIMESTAMP={}", timestamp);
}
