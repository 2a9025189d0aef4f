// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Shared building blocks for the forward-protocol check bridge: the worker
//! lifecycle contract, the bounded inter-stage mailbox, and the data model
//! passed between pipeline stages.

pub mod check;
pub mod mailbox;
pub mod node;
pub mod record;
pub mod sink;
pub mod worker;

pub use check::{CheckCode, CheckKind, CheckResult};
pub use mailbox::Mailbox;
pub use node::{NodeLookup, NodeMeta};
pub use record::{Entry, FieldMap, RecordSet};
pub use worker::{ShutdownFlag, Worker, WorkerSet};
