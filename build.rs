//! Build script for LCR meter firmware
//!
//! Handles memory layout configuration for the embedded target.

fn main() {
    // Tell Cargo to re-run this if the linker script changes
    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");

    // Link memory.x from project directory (embedded target only)
    if std::env::var("CARGO_FEATURE_EMBEDDED").is_ok() {
        if let Ok(dir) = std::env::var("CARGO_MANIFEST_DIR") {
            println!("cargo:rustc-link-search={dir}");
        }
    }
}
