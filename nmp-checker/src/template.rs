// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Narrow compiler seam for rule value templates and threshold expressions.
//!
//! A value template selects one string out of a record: `values[N]` picks
//! the N-th sample, a bare field name (`host`, `plugin`, `plugin_instance`,
//! `type`, `type_instance`, `tag`) picks that field, and the empty template
//! defaults to the first sample. Threshold expressions evaluate to the
//! string the comparison parses; the built-in compiler treats them as
//! literals, which is what configured thresholds are at runtime.

use crate::record::MetricRecord;

/// Error raised while rendering a template against a record.
#[derive(Debug, PartialEq, Eq)]
pub enum TemplateError {
    /// The selected sample index does not exist in `values`.
    OutOfRange { index: usize, len: usize },
}

impl std::fmt::Display for TemplateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemplateError::OutOfRange { index, len } => {
                write!(f, "values[{index}] out of range, record has {len} samples")
            }
        }
    }
}

impl std::error::Error for TemplateError {}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Selector {
    ValueIndex(usize),
    Host,
    Plugin,
    PluginInstance,
    Type,
    TypeInstance,
    Tag,
}

/// Compiled value template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueTemplate {
    source: String,
    selector: Selector,
}

impl ValueTemplate {
    /// Compile a template string. Returns `None` for an unknown selector;
    /// the caller reports it as a configuration error.
    pub fn compile(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        let selector = if trimmed.is_empty() {
            Selector::ValueIndex(0)
        } else if let Some(index) = trimmed
            .strip_prefix("values[")
            .and_then(|rest| rest.strip_suffix(']'))
        {
            Selector::ValueIndex(index.parse().ok()?)
        } else {
            match trimmed {
                "host" => Selector::Host,
                "plugin" => Selector::Plugin,
                "plugin_instance" => Selector::PluginInstance,
                "type" => Selector::Type,
                "type_instance" => Selector::TypeInstance,
                "tag" => Selector::Tag,
                _ => return None,
            }
        };
        Some(Self {
            source: text.to_owned(),
            selector,
        })
    }

    /// The default template: first element of `values`.
    pub fn first_value() -> Self {
        Self {
            source: String::new(),
            selector: Selector::ValueIndex(0),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn render(&self, record: &MetricRecord) -> Result<String, TemplateError> {
        match &self.selector {
            Selector::ValueIndex(index) => record
                .values
                .get(*index)
                .map(|v| v.to_string())
                .ok_or(TemplateError::OutOfRange {
                    index: *index,
                    len: record.values.len(),
                }),
            Selector::Host => Ok(record.host.clone()),
            Selector::Plugin => Ok(record.plugin.clone()),
            Selector::PluginInstance => Ok(record.plugin_instance.clone()),
            Selector::Type => Ok(record.type_name.clone()),
            Selector::TypeInstance => Ok(record.type_instance.clone()),
            Selector::Tag => Ok(record.tag.clone()),
        }
    }
}

/// Compiled threshold expression.
///
/// The compiler seam guarantees a string-typed result; the built-in
/// implementation evaluates to the configured literal. Whether that string
/// parses as a number is the comparison's concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdExpr {
    source: String,
}

impl ThresholdExpr {
    pub fn compile(text: &str) -> Self {
        Self {
            source: text.to_owned(),
        }
    }

    pub fn eval(&self) -> String {
        self.source.clone()
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> MetricRecord {
        MetricRecord {
            tag: "collectd".to_owned(),
            host: "h1".to_owned(),
            plugin: "cpu".to_owned(),
            type_instance: "idle".to_owned(),
            values: vec![88.5, 2.0],
            ..Default::default()
        }
    }

    #[test]
    fn empty_template_selects_first_value() {
        let template = ValueTemplate::compile("").unwrap();
        assert_eq!(template.render(&record()).unwrap(), "88.5");
    }

    #[test]
    fn indexed_value_selector() {
        let template = ValueTemplate::compile("values[1]").unwrap();
        assert_eq!(template.render(&record()).unwrap(), "2");
    }

    #[test]
    fn whole_values_render_without_fraction() {
        let template = ValueTemplate::first_value();
        let mut record = record();
        record.values = vec![5.0];
        assert_eq!(template.render(&record).unwrap(), "5");
    }

    #[test]
    fn field_selectors() {
        let record = record();
        for (text, expected) in [
            ("host", "h1"),
            ("plugin", "cpu"),
            ("type_instance", "idle"),
            ("tag", "collectd"),
        ] {
            let template = ValueTemplate::compile(text).unwrap();
            assert_eq!(template.render(&record).unwrap(), expected, "{text}");
        }
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        let template = ValueTemplate::compile("values[5]").unwrap();
        assert_eq!(
            template.render(&record()).unwrap_err(),
            TemplateError::OutOfRange { index: 5, len: 2 }
        );
    }

    #[test]
    fn unknown_selector_is_rejected() {
        assert!(ValueTemplate::compile("uptime").is_none());
        assert!(ValueTemplate::compile("values[x]").is_none());
    }

    #[test]
    fn threshold_expression_evaluates_to_its_literal() {
        let expr = ThresholdExpr::compile("42.5");
        assert_eq!(expr.eval(), "42.5");
    }
}
