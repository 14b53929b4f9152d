// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-env-changed=LINEAR_SCANNER_VERSION");

    // Packagers can pin the version string without a git checkout
    let version = std::env::var("LINEAR_SCANNER_VERSION")
        .ok()
        .or_else(describe_head)
        .unwrap_or_else(|| std::env::var("CARGO_PKG_VERSION").unwrap_or_default());

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// Version from `git describe`, e.g. "0.1.0" on a tag or "0.1.0-3-gabcdef1" after it
fn describe_head() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--match", "v*"])
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let described = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if described.is_empty() {
        return None;
    }

    Some(
        described
            .strip_prefix('v')
            .unwrap_or(&described)
            .to_string(),
    )
}
