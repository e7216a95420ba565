// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repair of malformed report JSON.
//!
//! Early uploads embedded a pretty-printed envelope as the value of
//! `contenido_cifrado` without escaping it, producing documents such as:
//!
//! ```text
//! {
//!   "tipo": "acoso_escolar",
//!   "contenido_cifrado": "{
//!   "version": "1.0",
//!   "encrypted": true,
//!   ...
//! }",
//!   "fecha": "2025-03-14T10:00:00.000Z"
//! }
//! ```
//!
//! The repairer walks the text line by line with a two-state machine
//! (`Outside` / `InsideEmbeddedField`), buffers the raw fragment and splices
//! it back as a properly escaped JSON string. Text that already parses is
//! never touched.

use serde_json::Value;
use tracing::debug;

use super::envelope::EMBEDDED_CIPHERTEXT_FIELD;

/// Field names whose values may hold an unescaped embedded document.
pub const KNOWN_EMBEDDED_FIELDS: &[&str] = &[EMBEDDED_CIPHERTEXT_FIELD];

/// One spliced embedded field. Line numbers are 1-based and inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixup {
    pub field: String,
    pub open_line: usize,
    pub close_line: usize,
}

/// Why a repair attempt did not produce valid JSON.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepairFailure {
    #[error("embedded field `{field}` opened on line {line} is never closed")]
    UnterminatedField { field: String, line: usize },

    #[error("spliced text is still not valid JSON: {reason}")]
    StillInvalid { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairStatus {
    /// The input already parsed; nothing was changed.
    AlreadyValid,
    /// One or more embedded fields were spliced and the result parses.
    Repaired,
    /// No embedded-field marker anywhere: the text is not JSON we know how to fix.
    Passthrough,
    /// A marker matched but the result could not be made valid.
    Failed(RepairFailure),
}

/// Outcome of [`repair`]. On anything but `Repaired`, `text` is the input unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairResult {
    pub text: String,
    pub status: RepairStatus,
    pub fixups: Vec<Fixup>,
}

impl RepairResult {
    /// True when `text` is valid JSON.
    pub fn success(&self) -> bool {
        matches!(self.status, RepairStatus::AlreadyValid | RepairStatus::Repaired)
    }

    pub fn failure(&self) -> Option<&RepairFailure> {
        match &self.status {
            RepairStatus::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    fn unchanged(text: &str, status: RepairStatus) -> Self {
        Self {
            text: text.to_string(),
            status,
            fixups: Vec::new(),
        }
    }
}

enum ScanState<'a> {
    Outside,
    InsideEmbeddedField {
        field: &'static str,
        /// Opening line up to and including the value's opening quote.
        prefix: &'a str,
        open_line: usize,
        buffer: String,
    },
}

/// Normalize `text` into valid JSON if it matches a known malformation.
pub fn repair(text: &str) -> RepairResult {
    if serde_json::from_str::<Value>(text).is_ok() {
        return RepairResult::unchanged(text, RepairStatus::AlreadyValid);
    }

    let mut output: Vec<String> = Vec::new();
    let mut fixups = Vec::new();
    let mut state = ScanState::Outside;

    for (index, line) in text.split('\n').enumerate() {
        let line_no = index + 1;
        state = match state {
            ScanState::Outside => match match_field_open(line) {
                Some((field, prefix)) => ScanState::InsideEmbeddedField {
                    field,
                    prefix,
                    open_line: line_no,
                    buffer: String::from("{"),
                },
                None => {
                    output.push(line.to_string());
                    ScanState::Outside
                }
            },
            ScanState::InsideEmbeddedField {
                field,
                prefix,
                open_line,
                mut buffer,
            } => match match_field_close(line) {
                Some(trailer) => {
                    buffer.push('\n');
                    buffer.push('}');
                    output.push(format!("{prefix}{}\"{trailer}", escape_json_string(&buffer)));
                    debug!(field, open_line, close_line = line_no, "Spliced embedded field");
                    fixups.push(Fixup {
                        field: field.to_string(),
                        open_line,
                        close_line: line_no,
                    });
                    ScanState::Outside
                }
                None => {
                    buffer.push('\n');
                    buffer.push_str(line);
                    ScanState::InsideEmbeddedField {
                        field,
                        prefix,
                        open_line,
                        buffer,
                    }
                }
            },
        };
    }

    if let ScanState::InsideEmbeddedField { field, open_line, .. } = state {
        debug!(field, open_line, "Embedded field never closed");
        return RepairResult::unchanged(
            text,
            RepairStatus::Failed(RepairFailure::UnterminatedField {
                field: field.to_string(),
                line: open_line,
            }),
        );
    }

    if fixups.is_empty() {
        return RepairResult::unchanged(text, RepairStatus::Passthrough);
    }

    let candidate = output.join("\n");
    match serde_json::from_str::<Value>(&candidate) {
        Ok(_) => RepairResult {
            text: candidate,
            status: RepairStatus::Repaired,
            fixups,
        },
        Err(e) => {
            debug!(fixups = fixups.len(), error = %e, "Spliced text still invalid");
            RepairResult::unchanged(
                text,
                RepairStatus::Failed(RepairFailure::StillInvalid {
                    reason: e.to_string(),
                }),
            )
        }
    }
}

/// A line ending in `"<field>": "{` with nothing after the brace.
///
/// Any text may precede the key, so a whole object opened on one line
/// (`{"tipo":"x","contenido_cifrado":"{`) matches too. Returns the matched
/// field and the line prefix ending at the opening quote.
fn match_field_open(line: &str) -> Option<(&'static str, &str)> {
    let content = line.trim_end();
    let rest = content.strip_suffix('{')?;
    let before_quote = rest.strip_suffix('"')?;
    let key_end = before_quote.trim_end().strip_suffix(':')?.trim_end();

    let field = KNOWN_EMBEDDED_FIELDS.iter().copied().find(|field| {
        key_end
            .strip_suffix('"')
            .and_then(|k| k.strip_suffix(*field))
            .and_then(|k| k.strip_suffix('"'))
            .is_some()
    })?;

    Some((field, rest))
}

/// `}",` (or `}"` for the last member of an object). Returns the trailer after the quote.
fn match_field_close(line: &str) -> Option<&'static str> {
    match line.trim() {
        "}\"," => Some(","),
        "}\"" => Some(""),
        _ => None,
    }
}

fn escape_json_string(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len() + raw.len() / 8);
    for c in raw.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\t' => escaped.push_str("\\t"),
            '\r' => escaped.push_str("\\r"),
            c if (c as u32) < 0x20 => escaped.push_str(&format!("\\u{:04x}", c as u32)),
            c => escaped.push(c),
        }
    }
    escaped
}
