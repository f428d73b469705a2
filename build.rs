use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Build-time AP overrides read by `src/config.rs` through `option_env!`
const AP_KEYS: [&str; 7] = [
    "LEDCTL_AP_SSID",
    "LEDCTL_AP_PASSWORD",
    "LEDCTL_AP_CHANNEL",
    "LEDCTL_AP_IP",
    "LEDCTL_AP_NETMASK",
    "LEDCTL_AP_GATEWAY",
    "LEDCTL_AP_DNS",
];

fn main() {
    let manifest_dir = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").unwrap());
    let out_dir = PathBuf::from(std::env::var("OUT_DIR").unwrap());

    // The firmware binary links against esp-hal's linker scripts; host
    // builds of the library must not.
    if std::env::var_os("CARGO_FEATURE_DEVICE").is_some() {
        println!("cargo:rustc-link-arg-bins=-Tlinkall.x");
    }

    forward_ap_config(&manifest_dir);
    bundle_page(&manifest_dir, &out_dir);
}

/// Make `.env` entries visible to `option_env!`. Variables already set in
/// the environment win over the file.
fn forward_ap_config(manifest_dir: &Path) {
    let env_path = manifest_dir.join(".env");
    println!("cargo:rerun-if-changed={}", env_path.display());
    for key in AP_KEYS {
        println!("cargo:rerun-if-env-changed={key}");
    }

    let file = if env_path.exists() {
        load_env_file(&env_path)
    } else {
        HashMap::new()
    };

    for key in AP_KEYS {
        if std::env::var_os(key).is_some() {
            continue;
        }
        if let Some(value) = file.get(key) {
            println!("cargo:rustc-env={key}={value}");
        }
    }
}

/// Copy the control page into OUT_DIR and flag it for `src/page.rs`
fn bundle_page(manifest_dir: &Path, out_dir: &Path) {
    println!("cargo:rustc-check-cfg=cfg(bundled_page)");
    println!("cargo:rerun-if-env-changed=LEDCTL_INDEX_HTML");

    let source = match std::env::var_os("LEDCTL_INDEX_HTML") {
        Some(path) => PathBuf::from(path),
        None => manifest_dir.join("html").join("index.html"),
    };
    println!("cargo:rerun-if-changed={}", source.display());

    match std::fs::read(&source) {
        Ok(bytes) => {
            std::fs::write(out_dir.join("index.html"), bytes).unwrap();
            println!("cargo:rustc-cfg=bundled_page");
        }
        Err(_) => {
            println!(
                "cargo:warning={} not found; firmware will serve the fallback page",
                source.display()
            );
        }
    }
}

fn load_env_file(path: &Path) -> HashMap<String, String> {
    let mut map = HashMap::new();
    let Ok(contents) = std::fs::read_to_string(path) else {
        return map;
    };

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"').trim_matches('\'');
        map.insert(key.trim().to_string(), value.to_string());
    }
    map
}
