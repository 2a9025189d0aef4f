// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Rules compiled from `check` configuration blocks, indexed by plugin.

use crate::template::{ThresholdExpr, ValueTemplate};
use nmp_config::Check;
use regex::Regex;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("check {name}: invalid comparator {comparator:?}")]
    InvalidComparator { name: String, comparator: String },
    #[error("check {name}: invalid humanize mode {mode:?}")]
    InvalidHumanize { name: String, mode: String },
    #[error("check {name}: invalid value template {template:?}")]
    InvalidTemplate { name: String, template: String },
    #[error("check {name}: invalid host override pattern {pattern:?}: {source}")]
    InvalidHostPattern {
        name: String,
        pattern: String,
        source: regex::Error,
    },
    #[error("check {name}: invalid meta override pattern {pattern:?}, expected \"key:value\"")]
    InvalidMetaPattern { name: String, pattern: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    GreaterThan,
    GreaterThanOrEqualTo,
    LesserThanOrEqualTo,
    LesserThan,
}

impl Comparator {
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            ">" => Some(Comparator::GreaterThan),
            ">=" => Some(Comparator::GreaterThanOrEqualTo),
            "<=" => Some(Comparator::LesserThanOrEqualTo),
            "<" => Some(Comparator::LesserThan),
            _ => None,
        }
    }

    pub fn compare(self, value: f64, threshold: f64) -> bool {
        match self {
            Comparator::GreaterThan => value > threshold,
            Comparator::GreaterThanOrEqualTo => value >= threshold,
            Comparator::LesserThanOrEqualTo => value <= threshold,
            Comparator::LesserThan => value < threshold,
        }
    }
}

impl std::fmt::Display for Comparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            Comparator::GreaterThan => ">",
            Comparator::GreaterThanOrEqualTo => ">=",
            Comparator::LesserThanOrEqualTo => "<=",
            Comparator::LesserThan => "<",
        };
        write!(f, "{symbol}")
    }
}

/// Output rendering applied to the compared value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Humanize {
    #[default]
    None,
    Bytes,
    Ftoa,
}

impl Humanize {
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "" => Some(Humanize::None),
            "bytes" => Some(Humanize::Bytes),
            "ftoa" => Some(Humanize::Ftoa),
            _ => None,
        }
    }
}

/// Per-host threshold override: applies when the compiled regex matches the
/// record host. Among matching overrides the highest priority wins.
#[derive(Debug, Clone)]
pub struct HostOverride {
    pub pattern: String,
    pub regex: Regex,
    pub priority: i64,
    pub warning: ThresholdExpr,
    pub critical: ThresholdExpr,
}

/// Per-meta threshold override: applies when the host's metadata maps `key`
/// to `value`. The first matching override in declaration order wins.
#[derive(Debug, Clone)]
pub struct MetaOverride {
    pub pattern: String,
    pub key: String,
    pub value: String,
    pub warning: ThresholdExpr,
    pub critical: ThresholdExpr,
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    pub plugin: String,
    pub plugin_instance: String,
    pub type_name: String,
    pub type_instance: String,
    pub comparator: Comparator,
    pub value: ValueTemplate,
    pub warning: ThresholdExpr,
    pub critical: ThresholdExpr,
    pub host_overrides: Vec<HostOverride>,
    pub meta_overrides: Vec<MetaOverride>,
    pub humanize: Humanize,
}

impl Rule {
    /// Compile one `check` block. Any failure here is a configuration error
    /// and fatal at startup.
    pub fn compile(name: &str, check: &Check) -> Result<Self, RuleError> {
        let comparator =
            Comparator::parse(&check.comparator).ok_or_else(|| RuleError::InvalidComparator {
                name: name.to_owned(),
                comparator: check.comparator.clone(),
            })?;
        let humanize = Humanize::parse(&check.humanize).ok_or_else(|| RuleError::InvalidHumanize {
            name: name.to_owned(),
            mode: check.humanize.clone(),
        })?;
        let value =
            ValueTemplate::compile(&check.value).ok_or_else(|| RuleError::InvalidTemplate {
                name: name.to_owned(),
                template: check.value.clone(),
            })?;

        let mut host_overrides = Vec::with_capacity(check.host.len());
        for (pattern, entry) in &check.host {
            let regex = Regex::new(pattern).map_err(|source| RuleError::InvalidHostPattern {
                name: name.to_owned(),
                pattern: pattern.clone(),
                source,
            })?;
            host_overrides.push(HostOverride {
                pattern: pattern.clone(),
                regex,
                priority: entry.priority,
                warning: ThresholdExpr::compile(&entry.warning),
                critical: ThresholdExpr::compile(&entry.critical),
            });
        }

        let mut meta_overrides = Vec::with_capacity(check.meta.len());
        for (pattern, entry) in &check.meta {
            let (key, value) =
                pattern
                    .split_once(':')
                    .ok_or_else(|| RuleError::InvalidMetaPattern {
                        name: name.to_owned(),
                        pattern: pattern.clone(),
                    })?;
            meta_overrides.push(MetaOverride {
                pattern: pattern.clone(),
                key: key.to_owned(),
                value: value.to_owned(),
                warning: ThresholdExpr::compile(&entry.warning),
                critical: ThresholdExpr::compile(&entry.critical),
            });
        }

        Ok(Rule {
            name: name.to_owned(),
            plugin: check.plugin.clone(),
            plugin_instance: check.plugin_instance.clone(),
            type_name: check.type_name.clone(),
            type_instance: check.type_instance.clone(),
            comparator,
            value,
            warning: ThresholdExpr::compile(&check.warning),
            critical: ThresholdExpr::compile(&check.critical),
            host_overrides,
            meta_overrides,
            humanize,
        })
    }
}

/// Compile every check block and group the rules by plugin, preserving the
/// declaration order within each plugin.
pub fn index_rules(
    checks: &indexmap::IndexMap<String, Check>,
) -> Result<HashMap<String, Vec<Rule>>, RuleError> {
    let mut index: HashMap<String, Vec<Rule>> = HashMap::new();
    for (name, check) in checks {
        let rule = Rule::compile(name, check)?;
        index.entry(rule.plugin.clone()).or_default().push(rule);
    }
    Ok(index)
}
