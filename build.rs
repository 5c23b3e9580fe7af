use std::process::Command;

fn main() {
    println!(
        "cargo:rustc-env=WASM_SPENDING_CORE_VERSION={}",
        env!("CARGO_PKG_VERSION")
    );

    // Capture git commit hash
    let git_hash = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                String::from_utf8(output.stdout).ok()
            } else {
                None
            }
        })
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=WASM_SPENDING_CORE_GIT_HASH={}", git_hash);
}
