// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use nmp_core::FieldMap;

/// One normalized metric observation. All string fields default to empty;
/// `values` is typically a single floating-point sample. `raw` preserves the
/// full original payload mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricRecord {
    pub tag: String,
    /// Agent-supplied unix seconds.
    pub timestamp: u64,
    pub host: String,
    pub plugin: String,
    pub plugin_instance: String,
    pub type_name: String,
    pub type_instance: String,
    pub values: Vec<f64>,
    pub ds_names: Vec<String>,
    pub ds_types: Vec<String>,
    pub interval: u8,
    pub raw: FieldMap,
}

/// Accepts normalized records from the normalizer, one at a time.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn emit(&self, record: MetricRecord);
}
