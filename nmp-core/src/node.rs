// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

/// Host metadata as returned by the topology directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMeta {
    pub node: String,
    pub datacenter: String,
    pub meta: HashMap<String, String>,
}

/// Non-blocking lookup of cached host metadata.
///
/// A miss returns `None`, never an error; callers treat a missing node as
/// "no override applicable". Until the first topology load completes every
/// lookup misses.
pub trait NodeLookup: Send + Sync {
    fn get_node(&self, host: &str) -> Option<NodeMeta>;
}
