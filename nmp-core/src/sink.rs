// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Contracts between pipeline stages.
//!
//! Every `emit` is fire-and-forget: once the receiving stage has been
//! stopped the call discards its payload instead of failing, so an upstream
//! stage never has to handle a downstream shutdown as an error.

use crate::check::CheckResult;
use crate::record::RecordSet;
use async_trait::async_trait;

/// Accepts decoded record sets from the protocol ingest.
#[async_trait]
pub trait RecordSetSink: Send + Sync {
    async fn emit(&self, sets: Vec<RecordSet>);
}

/// Accepts classified check results from the rule evaluator.
#[async_trait]
pub trait CheckResultSink: Send + Sync {
    async fn emit(&self, results: Vec<CheckResult>);
}

/// Accepts rendered spool payloads from the result formatter.
#[async_trait]
pub trait SpoolSink: Send + Sync {
    async fn emit(&self, payload: String);
}
