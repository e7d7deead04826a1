//! Diagnostics: the textual debug-socket line format, decoupled from the
//! socket itself.
//!
//! The core never opens a socket; it formats lines and hands them to
//! whatever [`DebugSink`] the composition root wires up (a real debug
//! socket, `log`, or both). `DebugType`/`DebugLevel` double as the masks
//! `ConfigDb`'s `DebugType`/`DebugLevel` parameters hold.

use std::time::{SystemTime, UNIX_EPOCH};

use bitflags::bitflags;

bitflags! {
    /// Event categories a debug line can belong to; matched against the
    /// `DebugType` mask parameter (`ConfigDb`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DebugType: u32 {
        const ERROR   = 1 << 0;
        const WARNING = 1 << 1;
        const INFO    = 1 << 2;
        const DEBUG   = 1 << 3;
    }
}

/// Verbosity threshold; matched against the `DebugLevel` mask parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum DebugLevel {
    Radio = 0,
    Phy = 1,
    Mac = 2,
    Rlc = 3,
    Other = 4,
}

/// One fully-formatted debug line, ready to hand to a [`DebugSink`].
#[derive(Debug, Clone)]
pub struct DebugEvent {
    pub kind: DebugType,
    pub level: DebugLevel,
    pub file: &'static str,
    pub line: u32,
    pub text: String,
    pub hex_payload: Option<Vec<u8>>,
}

/// Where formatted debug lines go. A real debug socket, `log`, or a test
/// collector all implement this; the core only ever calls `emit`.
pub trait DebugSink: Send + Sync {
    fn emit(&self, event: &DebugEvent);
}

/// Forwards every event to the `log` facade at a level derived from
/// [`DebugType`] (teacher's logging stack — see `DESIGN.md`).
pub struct LogSink;

impl DebugSink for LogSink {
    fn emit(&self, event: &DebugEvent) {
        let line = format_debug_line(event);
        if event.kind.contains(DebugType::ERROR) {
            log::error!("{line}");
        } else if event.kind.contains(DebugType::WARNING) {
            log::warn!("{line}");
        } else if event.kind.contains(DebugType::DEBUG) {
            log::debug!("{line}");
        } else {
            log::info!("{line}");
        }
    }
}

fn debug_type_text(kind: DebugType) -> &'static str {
    if kind.contains(DebugType::ERROR) {
        "error"
    } else if kind.contains(DebugType::WARNING) {
        "warning"
    } else if kind.contains(DebugType::DEBUG) {
        "debug"
    } else {
        "info"
    }
}

fn debug_level_text(level: DebugLevel) -> &'static str {
    match level {
        DebugLevel::Radio => "radio",
        DebugLevel::Phy => "phy",
        DebugLevel::Mac => "mac",
        DebugLevel::Rlc => "rlc",
        DebugLevel::Other => "other",
    }
}

/// Formats one line exactly as §6 specifies:
/// `<unix_sec>.<microsec> <type> <level> <file> <line> <text> [<hex>]`.
pub fn format_debug_line(event: &DebugEvent) -> String {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    let mut line = format!(
        "{}.{:06} {} {} {} {} {}",
        now.as_secs(),
        now.subsec_micros(),
        debug_type_text(event.kind),
        debug_level_text(event.level),
        event.file,
        event.line,
        event.text,
    );
    if let Some(hex) = &event.hex_payload {
        line.push(' ');
        for byte in hex {
            line.push_str(&format!("{byte:02x}"));
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_includes_all_fields_in_order() {
        let event = DebugEvent {
            kind: DebugType::ERROR,
            level: DebugLevel::Mac,
            file: "mac/mod.rs",
            line: 42,
            text: "late subframe".to_string(),
            hex_payload: None,
        };
        let line = format_debug_line(&event);
        assert!(line.contains("error mac mac/mod.rs 42 late subframe"));
    }

    #[test]
    fn hex_payload_is_appended_when_present() {
        let event = DebugEvent {
            kind: DebugType::INFO,
            level: DebugLevel::Phy,
            file: "phy/mod.rs",
            line: 7,
            text: "rar".to_string(),
            hex_payload: Some(vec![0xDE, 0xAD]),
        };
        let line = format_debug_line(&event);
        assert!(line.ends_with("dead"));
    }

    #[test]
    fn combined_type_mask_prefers_error_over_warning() {
        let kind = DebugType::ERROR | DebugType::WARNING;
        assert_eq!(debug_type_text(kind), "error");
    }
}
