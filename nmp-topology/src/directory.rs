// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Query contract of the topology directory and its HTTP catalog client.

use anyhow::Result;
use async_trait::async_trait;
use nmp_core::NodeMeta;
use serde::Deserialize;
use std::collections::HashMap;

/// Bulk enumeration interface of the metadata directory.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn datacenters(&self) -> Result<Vec<String>>;
    async fn nodes(&self, datacenter: &str) -> Result<Vec<NodeMeta>>;
}

/// HTTP client for a consul-style catalog API.
pub struct CatalogClient {
    base: String,
    client: reqwest::Client,
}

impl CatalogClient {
    pub fn new(base: impl Into<String>) -> Self {
        let mut base = base.into();
        while base.ends_with('/') {
            base.pop();
        }
        Self {
            base,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CatalogNode {
    #[serde(rename = "Node")]
    node: String,
    #[serde(rename = "Datacenter", default)]
    datacenter: String,
    #[serde(rename = "Meta", default)]
    meta: HashMap<String, String>,
}

#[async_trait]
impl Directory for CatalogClient {
    async fn datacenters(&self) -> Result<Vec<String>> {
        let url = format!("{}/v1/catalog/datacenters", self.base);
        let datacenters = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<String>>()
            .await?;
        Ok(datacenters)
    }

    async fn nodes(&self, datacenter: &str) -> Result<Vec<NodeMeta>> {
        let url = format!("{}/v1/catalog/nodes", self.base);
        let nodes = self
            .client
            .get(&url)
            .query(&[("dc", datacenter)])
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<CatalogNode>>()
            .await?;
        Ok(nodes
            .into_iter()
            .map(|n| NodeMeta {
                node: n.node,
                datacenter: if n.datacenter.is_empty() {
                    datacenter.to_owned()
                } else {
                    n.datacenter
                },
                meta: n.meta,
            })
            .collect())
    }
}
