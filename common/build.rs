// Expose BUILD_VERSION as "<crate version>-<short commit>" to the crate

use std::process::Command;

fn short_commit() -> String {
    if let Some(hash) = option_env!("TIERPASS_COMMIT_HASH") {
        return hash.chars().take(7).collect();
    }

    // No git available (source tarball, sandboxed build): not fatal
    match Command::new("git").args(["rev-parse", "--short", "HEAD"]).output() {
        Ok(output) if output.status.success() => {
            String::from_utf8_lossy(&output.stdout).trim().to_owned()
        }
        _ => "unknown".to_owned(),
    }
}

fn main() {
    let build_version = format!("{}-{}", env!("CARGO_PKG_VERSION"), short_commit());
    println!("cargo:rerun-if-env-changed=TIERPASS_COMMIT_HASH");
    println!("cargo:rustc-env=BUILD_VERSION={build_version}");
}
