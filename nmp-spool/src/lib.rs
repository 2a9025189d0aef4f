// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Tail of the pipeline: renders check results into the monitor's spool
//! text format and commits them to the spool directory.

pub mod format;
pub mod writer;

pub use format::Formatter;
pub use writer::SpoolWriter;
