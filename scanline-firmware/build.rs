//! Build script for scanline-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates display.toml at compile time

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Keys accepted in `[display]`, with their integer range (None = string)
const DISPLAY_KEYS: &[(&str, Option<(i64, i64)>)] = &[
    ("buffering", None),
    ("vsync_spacing", Some((-1, 5))),
    ("diff_gap", Some((0, 320))),
    ("compare_mask", Some((0, 0xFFFF))),
    ("refresh_mode", Some((0, 31))),
    ("late_start_percent", Some((0, 100))),
    ("rotation", Some((0, 3))),
    ("spi_clock_hz", Some((1_000_000, 80_000_000))),
    ("spi_read_clock_hz", Some((100_000, 20_000_000))),
    ("resync_interval_ms", Some((1, 60_000))),
];

fn main() {
    setup_linker();
    validate_config();
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    // Copy memory.x to the output directory
    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    // Tell rustc where to find memory.x
    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Validate display.toml at compile time
fn validate_config() {
    println!("cargo:rerun-if-changed=display.toml");

    let config_path = Path::new("display.toml");
    let content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => fail("Failed to read display.toml", &[e.to_string()]),
    };

    let config: toml::Value = match toml::from_str(&content) {
        Ok(value) => value,
        Err(e) => fail(
            "Invalid TOML syntax in display.toml",
            &e.to_string().lines().map(str::to_string).collect::<Vec<_>>(),
        ),
    };

    let mut errors = Vec::new();
    let table = config.as_table().cloned().unwrap_or_default();
    for name in table.keys().filter(|k| *k != "display") {
        errors.push(format!("unknown section [{}]", name));
    }

    match table.get("display") {
        Some(toml::Value::Table(display)) => validate_display(display, &mut errors),
        Some(_) => errors.push("[display] must be a table".to_string()),
        None => errors.push("missing [display] section".to_string()),
    }

    if !errors.is_empty() {
        fail("Invalid display configuration", &errors);
    }
    println!("cargo:warning=display.toml validated successfully");
}

fn validate_display(display: &toml::Table, errors: &mut Vec<String>) {
    for (key, value) in display {
        let Some(&(_, range)) = DISPLAY_KEYS.iter().find(|(k, _)| *k == key.as_str()) else {
            errors.push(format!("[display] unknown key '{}'", key));
            continue;
        };
        match (range, value) {
            (None, toml::Value::String(s)) => {
                if !["none", "no_buffering", "double", "triple"].contains(&s.as_str()) {
                    errors.push(format!(
                        "[display] {} must be 'none', 'double' or 'triple'",
                        key
                    ));
                }
            }
            (Some((lo, hi)), toml::Value::Integer(v)) => {
                if *v < lo || *v > hi {
                    errors.push(format!("[display] {} must be {}..={}", key, lo, hi));
                }
            }
            (None, _) => errors.push(format!("[display] {} must be a string", key)),
            (Some(_), _) => errors.push(format!("[display] {} must be an integer", key)),
        }
    }
}

fn fail(title: &str, lines: &[String]) -> ! {
    panic!(
        "\n\
        ╔══════════════════════════════════════════════════════════════════╗\n\
        ║  ERROR: {:<57}║\n\
        ╠══════════════════════════════════════════════════════════════════╣\n\
        {}\n\
        ╚══════════════════════════════════════════════════════════════════╝\n",
        title,
        lines
            .iter()
            .map(|e| format!("║  • {:<62} ║", e))
            .collect::<Vec<_>>()
            .join("\n")
    );
}
