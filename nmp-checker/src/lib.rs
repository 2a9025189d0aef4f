// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Middle of the pipeline: turns decoded record sets into typed metric
//! records (tag-filtered), evaluates the configured rules against each
//! record, and classifies the outcome as OK / WARNING / CRITICAL.

pub mod checker;
pub mod humanize;
pub mod normalize;
pub mod record;
pub mod rule;
pub mod template;

pub use checker::Checker;
pub use normalize::Normalizer;
pub use record::{MetricRecord, RecordSink};
pub use rule::{index_rules, Comparator, Humanize, Rule, RuleError};
pub use template::{ThresholdExpr, ValueTemplate};
