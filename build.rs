use std::{env, process::Command};

/// Stamps GIT_HASH/BUILD_TIMESTAMP env vars for the boot banner. Linker
/// layout (the Multiboot trampoline, `link.ld`) is supplied by the boot
/// environment, not this crate, so there is nothing else for build.rs to do.
fn main() {
    let git_hash = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .unwrap_or_else(|| "0000000000000000000000000000000000000000".to_string());
    println!("cargo:rustc-env=GIT_HASH={}", git_hash.trim());

    let build_timestamp = Command::new("date")
        .args(["+%s"])
        .output()
        .ok()
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .unwrap_or_else(|| "0".to_string());
    println!("cargo:rustc-env=BUILD_TIMESTAMP={}", build_timestamp.trim());

    println!("cargo:rerun-if-env-changed=TARGET");
    let _ = env::var("TARGET");
}
