//! Stamps the binaries with the source revision they were built from
//!
//! Every metadata record carries these values in its `software` section, so a
//! trace file can be matched to the exact orchestrator that produced it.
//!
//! - `WHISK_COMMIT`: `git describe --always --dirty`, or the value of the
//!   same-named environment variable when building outside a checkout
//! - `WHISK_PROFILE`: cargo profile
//! - `WHISK_BUILT_AT`: UTC build time, logged at startup only

use std::env;
use std::process::Command;

const UNKNOWN: &str = "unknown";

fn main() {
    println!("cargo:rerun-if-env-changed=WHISK_COMMIT");

    let commit = env::var("WHISK_COMMIT")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .or_else(describe_checkout)
        .unwrap_or_else(|| UNKNOWN.to_string());
    let profile = env::var("PROFILE").unwrap_or_else(|_| UNKNOWN.to_string());
    let built_at = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);

    println!("cargo:rustc-env=WHISK_COMMIT={}", commit.trim());
    println!("cargo:rustc-env=WHISK_PROFILE={}", profile);
    println!("cargo:rustc-env=WHISK_BUILT_AT={}", built_at);
}

/// Abbreviated commit, suffixed `-dirty` when the work tree has local edits
fn describe_checkout() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--always", "--dirty", "--abbrev=8"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok()
}
