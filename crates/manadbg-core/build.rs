//! Build script for manadbg-core
//!
//! This script checks system requirements before compilation:
//! - Minimum Rust version (let-else and `Mutex::new` in const contexts need 1.65+)
//! - Platform support for runtime image discovery
//!
//! ## Requirements
//!
//! - **Rust**: 1.65.0 or newer
//! - **Linux**: `/proc/<pid>/maps` is used to locate `libcoreclr.so`
//! - **macOS / Windows**: builds, but attach reports the runtime image as missing

fn main()
{
    if let Ok(rustc_version) = rustc_version::version() {
        let min_rust_version = rustc_version::Version::new(1, 65, 0);

        if rustc_version < min_rust_version {
            panic!(
                "manadbg-core requires Rust {} or newer, found {}",
                min_rust_version, rustc_version
            );
        }
    } else {
        // If we can't get version (e.g., in some build environments), just warn
        println!("cargo:warning=could not verify Rust version");
    }

    // cfg! in a build script describes the host, so read the target from cargo instead
    let target_os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    if target_os != "linux" {
        println!("cargo:warning=runtime image discovery relies on procfs; attach will fail on {target_os}");
    }
}
