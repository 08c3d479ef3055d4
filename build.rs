fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    set_long_version();
}

/// Expose `SPEEDPROBE_LONG_VERSION`, the package version plus the short git
/// revision when the build runs inside a checkout.
fn set_long_version() {
    use std::process::Command;

    let version = std::env::var("CARGO_PKG_VERSION").unwrap_or_default();
    let args = &["rev-parse", "--short=10", "HEAD"];
    let rev = Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .unwrap_or_default();

    let long_version = if rev.is_empty() {
        version
    } else {
        format!("{} (rev {})", version, rev)
    };
    println!("cargo:rustc-env=SPEEDPROBE_LONG_VERSION={}", long_version);
}
