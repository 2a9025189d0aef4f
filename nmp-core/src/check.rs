// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

/// Check outcome severity, numbered the way the monitor expects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CheckCode {
    Ok = 0,
    Warning = 1,
    Critical = 2,
    Unknown = 3,
}

impl fmt::Display for CheckCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as u8)
    }
}

/// Kind of check result. Service checks are the only kind currently emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    Service,
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckKind::Service => write!(f, "service"),
        }
    }
}

/// One classified check outcome, ready to be rendered into the spool format.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub hostname: String,
    pub kind: CheckKind,
    pub service_name: String,
    pub code: CheckCode,
    pub output: String,
}
