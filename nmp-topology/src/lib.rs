// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Topology side channel: keeps an expiring in-memory map of host metadata
//! that the rule evaluator consults for per-meta threshold overrides. Stale
//! beats empty: a failing directory never invalidates the cache.

pub mod cache;
pub mod directory;
pub mod refresher;

pub use cache::NodeCache;
pub use directory::{CatalogClient, Directory};
pub use refresher::TopologyRefresher;
