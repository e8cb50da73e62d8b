use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::Command;

// Build script that pins the linker plumbing, bakes a firmware version
// string into the binary, and injects the Wi-Fi credentials as compile-time
// env vars so they surface in code as plain `const`s.
//
// Exports:
//   - PICOSTATUS_FW_VERSION: "<crate> <semver> (profile <profile>, <git describe|unknown>)"
//   - PICOSTATUS_WIFI_SSID / PICOSTATUS_WIFI_PSK: environment or repo-root
//     .env override, baked-in defaults otherwise.

const DEFAULT_WIFI_SSID: &str = "Internet";
const DEFAULT_WIFI_PSK: &str = "Regeddit";

fn main() {
    // memory.x must be on the linker search path regardless of the directory
    // the build is invoked from.
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    fs::write(out_dir.join("memory.x"), include_bytes!("memory.x") as &[u8]).unwrap();
    println!("cargo:rustc-link-search={}", out_dir.display());
    println!("cargo:rerun-if-changed=memory.x");

    // When building from firmware/pico/, these args already come from
    // .cargo/config.toml; avoid emitting duplicates (they can cause duplicate
    // section definitions at link time).
    let rustflags = env::var("CARGO_ENCODED_RUSTFLAGS").unwrap_or_default();
    if !rustflags.contains("link.x") {
        println!("cargo:rustc-link-arg-bins=-Tlink.x");
    }
    if !rustflags.contains("defmt.x") {
        println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
    }
    if !rustflags.contains("--nmagic") {
        println!("cargo:rustc-link-arg-bins=--nmagic");
    }

    // Re-run when local sources change.
    println!("cargo:rerun-if-changed=src/");

    let pkg_name = env::var("CARGO_PKG_NAME").unwrap_or_else(|_| "unknown".to_string());
    let pkg_ver = env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".to_string());
    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());
    let git_info = git_describe().unwrap_or_else(|| "git unknown".to_string());

    let version_string = format!(
        "{name} {ver} (profile {profile}, {git})",
        name = pkg_name,
        ver = pkg_ver,
        profile = profile,
        git = git_info,
    );
    println!("cargo:rustc-env=PICOSTATUS_FW_VERSION={}", version_string);

    // Wi-Fi credentials stay compile-time constants; a repo-root .env or the
    // environment overrides the defaults at build time.
    let mut cfg = HashMap::new();
    if let Some(repo_root) = repo_root_from_manifest() {
        let env_path = repo_root.join(".env");
        if env_path.exists() {
            println!("cargo:rerun-if-changed={}", env_path.display());
            cfg.extend(load_env_file(&env_path));
        }
    }
    println!("cargo:rerun-if-env-changed=PICOSTATUS_WIFI_SSID");
    println!("cargo:rerun-if-env-changed=PICOSTATUS_WIFI_PSK");

    let wifi_ssid =
        get_cfg("PICOSTATUS_WIFI_SSID", &cfg).unwrap_or_else(|| DEFAULT_WIFI_SSID.to_string());
    let wifi_psk =
        get_cfg("PICOSTATUS_WIFI_PSK", &cfg).unwrap_or_else(|| DEFAULT_WIFI_PSK.to_string());

    println!("cargo:rustc-env=PICOSTATUS_WIFI_SSID={}", wifi_ssid);
    println!("cargo:rustc-env=PICOSTATUS_WIFI_PSK={}", wifi_psk);
}

fn repo_root_from_manifest() -> Option<PathBuf> {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").ok()?);
    manifest_dir.parent()?.parent().map(|p| p.to_path_buf())
}

fn git_describe() -> Option<String> {
    let repo_root = repo_root_from_manifest()?;
    let output = Command::new("git")
        .arg("-C")
        .arg(&repo_root)
        .args(["describe", "--tags", "--dirty", "--always"])
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let s = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn load_env_file(path: &std::path::Path) -> HashMap<String, String> {
    let mut map = HashMap::new();

    let contents = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(_) => return map,
    };

    for line in contents.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            let value = value.trim();

            if !key.is_empty() && !value.is_empty() {
                map.insert(key.to_string(), value.to_string());
            }
        }
    }

    map
}

fn get_cfg(key: &str, file_cfg: &HashMap<String, String>) -> Option<String> {
    if let Ok(v) = env::var(key) {
        let v = v.trim();
        if !v.is_empty() {
            return Some(v.to_string());
        }
    }

    if let Some(v) = file_cfg.get(key) {
        let v = v.trim();
        if !v.is_empty() {
            return Some(v.to_string());
        }
    }

    None
}
