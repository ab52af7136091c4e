// src/cluster/mod.rs

//! Cluster collaborator used by the pod-failure algorithm.
//!
//! The controllers and the executor only see [`ClusterClient`]. Production
//! code talks to Kubernetes through [`KubeCluster`]; development mode and
//! tests use the in-memory [`mock::MockCluster`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use k8s_openapi::api::core::v1::Pod;
use kube::api::{DeleteParams, ListParams};
use kube::{Api, Client, ResourceExt};
use tracing::debug;

use crate::errors::Result;

pub mod mock;

/// Boxed future returned by [`ClusterClient`] methods.
pub type ClusterFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Abstract cluster interface.
pub trait ClusterClient: Send + Sync + fmt::Debug {
    /// Names of the targets in `namespace` matching the label `selector`,
    /// in listing order.
    fn list_matching<'a>(&'a self, namespace: &'a str, selector: &'a str)
    -> ClusterFuture<'a, Vec<String>>;

    /// Delete a single target.
    fn delete<'a>(&'a self, namespace: &'a str, name: &'a str) -> ClusterFuture<'a, ()>;
}

/// Implementation backed by the Kubernetes pods API.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the in-cluster environment or the local kubeconfig.
    pub async fn try_default() -> Result<Self> {
        let client = Client::try_default().await?;
        Ok(Self::new(client))
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

impl fmt::Debug for KubeCluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeCluster")
            .field("default_namespace", &self.client.default_namespace())
            .finish_non_exhaustive()
    }
}

impl ClusterClient for KubeCluster {
    fn list_matching<'a>(
        &'a self,
        namespace: &'a str,
        selector: &'a str,
    ) -> ClusterFuture<'a, Vec<String>> {
        Box::pin(async move {
            let pods = self
                .pods(namespace)
                .list(&ListParams::default().labels(selector))
                .await?;
            let names: Vec<String> = pods.items.iter().map(|p| p.name_any()).collect();
            debug!(namespace, selector, count = names.len(), "listed matching pods");
            Ok(names)
        })
    }

    fn delete<'a>(&'a self, namespace: &'a str, name: &'a str) -> ClusterFuture<'a, ()> {
        Box::pin(async move {
            self.pods(namespace)
                .delete(name, &DeleteParams::default())
                .await?;
            Ok(())
        })
    }
}
