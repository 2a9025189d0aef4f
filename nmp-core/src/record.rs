// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use rmpv::Value;
use std::collections::HashMap;

/// Decoded frame payload data, after byte-string to text coercion.
pub type FieldMap = HashMap<String, Value>;

/// One `(timestamp, data)` entry of a forward-protocol frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Agent-supplied unix seconds.
    pub timestamp: u64,
    pub data: FieldMap,
}

/// One tagged batch of entries as delivered by a single protocol frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSet {
    pub tag: String,
    pub entries: Vec<Entry>,
}
