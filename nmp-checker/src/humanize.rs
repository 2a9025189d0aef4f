// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Output rendering for check results.

use crate::rule::Humanize;

const UNITS: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

/// Apply the rule's humanize mode to the compared value. A value that does
/// not parse as a number is passed through unchanged.
pub fn apply(mode: Humanize, value: &str) -> String {
    match (mode, value.parse::<f64>()) {
        (Humanize::Bytes, Ok(parsed)) => bytes(parsed),
        (Humanize::Ftoa, Ok(parsed)) => ftoa(parsed),
        _ => value.to_owned(),
    }
}

/// IEC rendering of a byte count, one decimal, trailing `.0` trimmed.
pub fn bytes(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let mut scaled = value.abs();
    let mut unit = 0;
    while scaled >= 1024.0 && unit < UNITS.len() - 1 {
        scaled /= 1024.0;
        unit += 1;
    }
    let mut text = format!("{scaled:.1}");
    if let Some(stripped) = text.strip_suffix(".0") {
        text = stripped.to_owned();
    }
    format!("{sign}{text} {}", UNITS[unit])
}

/// Minimal float-to-string rendering.
pub fn ftoa(value: f64) -> String {
    value.to_string()
}
