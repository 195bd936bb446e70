//! Stamps the binary with a build id for the startup banner
//!
//! `HANDOFF_BUILD_ID` is the short commit hash, suffixed `-dirty` when the
//! work tree has uncommitted changes, or `nogit` outside a checkout.

use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok().map(|s| s.trim().to_string())
}

fn main() {
    let build_id = match git(&["rev-parse", "--short=10", "HEAD"]) {
        Some(hash) => {
            let dirty = git(&["status", "--porcelain", "--untracked-files=no"])
                .is_some_and(|status| !status.is_empty());
            if dirty {
                format!("{}-dirty", hash)
            } else {
                hash
            }
        }
        None => "nogit".to_string(),
    };

    let built_at = chrono::Utc::now().format("%Y-%m-%dT%H:%MZ");
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=HANDOFF_BUILD_ID={}", build_id);
    println!("cargo:rustc-env=HANDOFF_BUILD_PROFILE={}", profile);
    println!("cargo:rustc-env=HANDOFF_BUILT_AT={}", built_at);
    println!("cargo:rerun-if-changed=../.git/HEAD");
    println!("cargo:rerun-if-changed=../.git/index");
    println!("cargo:rerun-if-changed=build.rs");
}
