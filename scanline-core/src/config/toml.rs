//! Minimal TOML reader for the display configuration
//!
//! Handles only the subset used by `display.toml`. It does NOT support the
//! full TOML grammar.
//!
//! Supported features:
//! - Key = value pairs (string, integer, hex integer)
//! - A single `[display]` section
//! - Comments (# ...)
//!
//! Keys missing from the file keep their default value. Out-of-range
//! numbers are clamped rather than rejected.

use super::types::{BufferingMode, DisplayConfig, VsyncSpacing};
use crate::diff::ToleranceMask;
use crate::framebuffer::Rotation;

/// Parse error, with the 1-based line it occurred on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Section other than `[display]`
    InvalidSection(usize),
    /// Line is neither a header nor `key = value`
    Syntax(usize),
    /// Key not recognized
    UnknownKey(usize),
    /// Value of the wrong type
    InvalidValue(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Root,
    Display,
}

/// Parse `display.toml` content into a [`DisplayConfig`]
pub fn parse_display_config(input: &str) -> Result<DisplayConfig, ConfigError> {
    let mut config = DisplayConfig::default();
    let mut section = Section::Root;

    for (idx, line) in input.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            section = match line[1..line.len() - 1].trim() {
                "display" => Section::Display,
                _ => return Err(ConfigError::InvalidSection(line_no)),
            };
            continue;
        }

        let (key, value) = parse_key_value(line).ok_or(ConfigError::Syntax(line_no))?;
        if section != Section::Display {
            return Err(ConfigError::UnknownKey(line_no));
        }
        apply_display_key(&mut config, key, value).map_err(|e| match e {
            KeyError::Unknown => ConfigError::UnknownKey(line_no),
            KeyError::Value => ConfigError::InvalidValue(line_no),
        })?;
    }

    Ok(config.sanitized())
}

enum KeyError {
    Unknown,
    Value,
}

fn apply_display_key(config: &mut DisplayConfig, key: &str, value: &str) -> Result<(), KeyError> {
    match key {
        "buffering" => config.buffering = parse_buffering(value)?,
        "vsync_spacing" => config.vsync_spacing = VsyncSpacing::from_i8(parse_int(value)?),
        "diff_gap" => config.diff_gap = parse_int(value)?,
        "compare_mask" => config.compare_mask = ToleranceMask(parse_int(value)?),
        "refresh_mode" => config.refresh_mode = parse_int(value)?,
        "late_start_percent" => config.late_start_percent = parse_int(value)?,
        "rotation" => config.rotation = Rotation::from_index(parse_int(value)?),
        "spi_clock_hz" => config.spi_clock_hz = parse_int(value)?,
        "spi_read_clock_hz" => config.spi_read_clock_hz = parse_int(value)?,
        "resync_interval_ms" => {
            let ms: u32 = parse_int(value)?;
            config.resync_interval_us = ms.saturating_mul(1000);
        }
        _ => return Err(KeyError::Unknown),
    }
    Ok(())
}

/// Parse "key = value" line
fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let eq_pos = line.find('=')?;
    let key = line[..eq_pos].trim();
    let value = line[eq_pos + 1..].trim();

    // Remove inline comments
    let value = match value.find('#') {
        Some(hash_pos) if value[..hash_pos].matches('"').count() % 2 == 0 => {
            value[..hash_pos].trim()
        }
        _ => value,
    };

    if key.is_empty() || value.is_empty() {
        return None;
    }

    Some((key, value))
}

/// Remove surrounding quotes, if any
fn parse_string(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// Parse a decimal or `0x` hex integer, `_` separators allowed
fn parse_int<T: TryFrom<i64>>(value: &str) -> Result<T, KeyError> {
    let mut digits: heapless::String<24> = heapless::String::new();
    for c in value.chars().filter(|c| *c != '_') {
        digits.push(c).map_err(|_| KeyError::Value)?;
    }
    let (negative, body) = match digits.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, digits.as_str()),
    };
    let magnitude = match body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => body.parse::<i64>(),
    }
    .map_err(|_| KeyError::Value)?;
    let signed = if negative { -magnitude } else { magnitude };
    T::try_from(signed).map_err(|_| KeyError::Value)
}

fn parse_buffering(value: &str) -> Result<BufferingMode, KeyError> {
    match parse_string(value) {
        "none" | "no_buffering" => Ok(BufferingMode::NoBuffering),
        "double" => Ok(BufferingMode::DoubleBuffering),
        "triple" => Ok(BufferingMode::TripleBuffering),
        _ => Err(KeyError::Value),
    }
}
