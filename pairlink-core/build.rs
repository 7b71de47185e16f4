//! Build script for pairlink-core
//!
//! - Provisions the pre-shared pairing secret
//! - Validates pairlink.toml and generates the preconfigured peer constant
//!
//! Everything lands in `$OUT_DIR/config.rs`, included by `src/config.rs`.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const SECRET_ENV: &str = "PAIRLINK_PAIRING_SECRET";
const CONFIG_ENV: &str = "PAIRLINK_CONFIG";
const SECRETS_FILE: &str = "secrets.local.toml";
const CONFIG_FILE: &str = "pairlink.toml";

/// Development-only secret shared by every unprovisioned build
const PLACEHOLDER_SECRET: &str = "00000000deadbeefcafebabedeadbeef";

/// Longest name that still leaves a NUL in the 16 byte wire field
const MAX_NAME_BYTES: usize = 15;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed={}", SECRETS_FILE);
    println!("cargo:rerun-if-env-changed={}", SECRET_ENV);
    println!("cargo:rerun-if-env-changed={}", CONFIG_ENV);

    let release = env::var("PROFILE").map(|p| p == "release").unwrap_or(false);
    let (secret, is_placeholder) = provision_secret(release);
    let peer = load_preconfigured_peer();

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    fs::write(
        out_dir.join("config.rs"),
        render(&secret, is_placeholder, peer.as_ref()),
    )
    .unwrap();
}

/// Format a boxed error banner
fn banner(title: &str, lines: &[String]) -> String {
    let mut out = String::from("\n");
    out.push_str("╔══════════════════════════════════════════════════════════════════╗\n");
    out.push_str(&format!("║  {:<64}║\n", title));
    out.push_str("╠══════════════════════════════════════════════════════════════════╣\n");
    for line in lines {
        let truncated = if line.chars().count() > 62 {
            let cut: String = line.chars().take(59).collect();
            format!("{}...", cut)
        } else {
            line.clone()
        };
        out.push_str(&format!("║  {:<64}║\n", truncated));
    }
    out.push_str("╚══════════════════════════════════════════════════════════════════╝\n");
    out
}

/// Resolve the pairing secret
///
/// Priority: environment variable, then `secrets.local.toml`. Release builds
/// refuse to fall back to the placeholder.
fn provision_secret(release: bool) -> ([u8; 16], bool) {
    let (source, hex) = match env::var(SECRET_ENV) {
        Ok(value) if !value.trim().is_empty() => (SECRET_ENV.to_string(), Some(value)),
        _ => (SECRETS_FILE.to_string(), read_secrets_file()),
    };

    match hex {
        Some(hex) if !hex.trim().eq_ignore_ascii_case(PLACEHOLDER_SECRET) => {
            (parse_secret(&source, &hex), false)
        }
        found => {
            let reason = if found.is_some() {
                "The configured secret is the shared development placeholder."
            } else {
                "No pairing secret was provisioned."
            };
            if release {
                panic!(
                    "{}",
                    banner(
                        "ERROR: Release build without a pairing secret",
                        &[
                            reason.to_string(),
                            String::new(),
                            format!("Set {} to 32 hex characters, or", SECRET_ENV),
                            format!("copy secrets.template.toml to {}", SECRETS_FILE),
                            "and fill in [pairing] secret.".to_string(),
                        ],
                    )
                );
            }
            println!(
                "cargo:warning={} Using the development placeholder; do not ship this build.",
                reason
            );
            (parse_secret("placeholder", PLACEHOLDER_SECRET), true)
        }
    }
}

fn read_secrets_file() -> Option<String> {
    let path = Path::new(SECRETS_FILE);
    if !path.exists() {
        return None;
    }

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => panic!(
            "{}",
            banner(
                "ERROR: Failed to read secrets.local.toml",
                &[format!("Error: {}", e)]
            )
        ),
    };

    let value: toml::Value = match toml::from_str(&content) {
        Ok(value) => value,
        Err(e) => panic!(
            "{}",
            banner(
                "ERROR: Invalid TOML syntax in secrets.local.toml",
                &e.to_string().lines().map(str::to_string).collect::<Vec<_>>()
            )
        ),
    };

    value
        .get("pairing")
        .and_then(|p| p.get("secret"))
        .and_then(|s| s.as_str())
        .map(str::to_string)
}

fn invalid_secret(source: &str, detail: &str) -> ! {
    panic!(
        "{}",
        banner(
            "ERROR: Invalid pairing secret",
            &[
                format!("Source: {}", source),
                detail.to_string(),
                "Expected exactly 32 hexadecimal characters.".to_string(),
            ]
        )
    )
}

fn parse_secret(source: &str, hex: &str) -> [u8; 16] {
    let hex = hex.trim();
    if hex.len() != 32 || !hex.is_ascii() {
        invalid_secret(source, &format!("Found {} characters.", hex.len()));
    }

    let mut secret = [0u8; 16];
    for (i, byte) in secret.iter_mut().enumerate() {
        *byte = match u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16) {
            Ok(b) => b,
            Err(_) => invalid_secret(source, "Contains a non-hex character."),
        };
    }

    if secret.iter().all(|&b| b == 0) {
        invalid_secret(source, "An all-zero secret is not allowed.");
    }
    secret
}

/// Preconfigured peer as read from pairlink.toml
struct PeerEntry {
    mac: [u8; 6],
    device_type: &'static str,
    name: String,
}

fn load_preconfigured_peer() -> Option<PeerEntry> {
    let explicit = env::var(CONFIG_ENV).ok().filter(|p| !p.trim().is_empty());
    let path = PathBuf::from(explicit.clone().unwrap_or_else(|| CONFIG_FILE.to_string()));
    println!("cargo:rerun-if-changed={}", path.display());

    if !path.exists() {
        if explicit.is_some() {
            panic!(
                "{}",
                banner(
                    "ERROR: Link configuration not found",
                    &[format!("{} points at {}", CONFIG_ENV, path.display())]
                )
            );
        }
        return None;
    }

    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) => panic!(
            "{}",
            banner(
                "ERROR: Failed to read link configuration",
                &[format!("{}: {}", path.display(), e)]
            )
        ),
    };

    let config: toml::Value = match toml::from_str(&content) {
        Ok(value) => value,
        Err(e) => panic!(
            "{}",
            banner(
                "ERROR: Invalid TOML syntax in link configuration",
                &e.to_string().lines().map(str::to_string).collect::<Vec<_>>()
            )
        ),
    };

    let table = config.get("preconfigured_peer")?;
    let mut errors = Vec::new();

    let mac = match table.get("mac").and_then(|v| v.as_str()) {
        Some(text) => match parse_mac(text) {
            Some(mac) if mac == [0; 6] || mac == [0xFF; 6] => {
                errors.push(format!("mac {} is not a unicast address", text));
                None
            }
            Some(mac) => Some(mac),
            None => {
                errors.push(format!("mac '{}' is not AA:BB:CC:DD:EE:FF", text));
                None
            }
        },
        None => {
            errors.push("missing 'mac'".to_string());
            None
        }
    };

    let device_type = match table.get("device_type") {
        Some(value) => match parse_device_type(value) {
            Some(variant) => Some(variant),
            None => {
                errors.push(format!("unknown device_type {}", value));
                None
            }
        },
        None => {
            errors.push("missing 'device_type'".to_string());
            None
        }
    };

    let name = match table.get("name") {
        None => String::new(),
        Some(value) => match value.as_str() {
            Some(name) if name.len() <= MAX_NAME_BYTES => name.to_string(),
            Some(_) => {
                errors.push(format!("name longer than {} bytes", MAX_NAME_BYTES));
                String::new()
            }
            None => {
                errors.push("'name' must be a string".to_string());
                String::new()
            }
        },
    };

    match (mac, device_type) {
        (Some(mac), Some(device_type)) if errors.is_empty() => {
            println!("cargo:warning={} validated successfully", path.display());
            Some(PeerEntry {
                mac,
                device_type,
                name,
            })
        }
        _ => panic!(
            "{}",
            banner(
                "ERROR: Invalid [preconfigured_peer] in link configuration",
                &errors
                    .iter()
                    .map(|e| format!("• {}", e))
                    .collect::<Vec<_>>()
            )
        ),
    }
}

fn parse_mac(text: &str) -> Option<[u8; 6]> {
    let mut mac = [0u8; 6];
    let mut parts = text.split(|c| c == ':' || c == '-');
    for byte in mac.iter_mut() {
        let part = parts.next()?;
        if part.len() != 2 {
            return None;
        }
        *byte = u8::from_str_radix(part, 16).ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(mac)
}

/// Map a TOML device type (name or wire id) to its `DeviceType` variant
fn parse_device_type(value: &toml::Value) -> Option<&'static str> {
    if let Some(id) = value.as_integer() {
        return match id {
            1 => Some("RemoteController"),
            2 => Some("FatigueTester"),
            _ => None,
        };
    }
    match value.as_str()?.to_ascii_lowercase().as_str() {
        "remote_controller" | "remote-controller" => Some("RemoteController"),
        "fatigue_tester" | "fatigue-tester" => Some("FatigueTester"),
        _ => None,
    }
}

fn render(secret: &[u8; 16], is_placeholder: bool, peer: Option<&PeerEntry>) -> String {
    let bytes = secret
        .iter()
        .map(|b| format!("0x{:02x}", b))
        .collect::<Vec<_>>()
        .join(", ");

    let peer = match peer {
        Some(peer) => format!(
            "Some(PreconfiguredPeer {{ address: MacAddress([{}]), device_type: DeviceType::{}, name: {:?} }})",
            peer.mac
                .iter()
                .map(|b| format!("0x{:02x}", b))
                .collect::<Vec<_>>()
                .join(", "),
            peer.device_type,
            peer.name,
        ),
        None => "None".to_string(),
    };

    format!(
        "// Generated by build.rs. Do not edit.\n\
         pub const PAIRING_SECRET: [u8; 16] = [{}];\n\
         pub const SECRET_IS_PLACEHOLDER: bool = {};\n\
         pub const PRECONFIGURED_PEER: Option<PreconfiguredPeer> = {};\n",
        bytes, is_placeholder, peer
    )
}
