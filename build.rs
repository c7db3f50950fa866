use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");

    let version = env!("CARGO_PKG_VERSION");
    let hash = git(&["rev-parse", "--short", "HEAD"]);
    let dirty = git(&["status", "--porcelain"]).is_some();

    // Builds from a source tarball carry the bare package version.
    let long_version = match hash {
        Some(hash) if dirty => format!("{} ({}-dirty)", version, hash),
        Some(hash) => format!("{} ({})", version, hash),
        None => version.to_string(),
    };

    println!("cargo:rustc-env=SNAPZ_VERSION={}", long_version);
}
