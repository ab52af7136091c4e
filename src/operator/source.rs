// src/operator/source.rs

//! Declarative sources of desired experiments for the reconcile loop.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{PoisonError, RwLock};

use tracing::debug;

use crate::config::loader::load_and_validate;
use crate::errors::Result;
use crate::experiment::ExperimentConfig;

pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Something that can say which experiments should currently be running.
pub trait ExperimentSource: Send + Sync + fmt::Debug {
    fn desired(&self) -> SourceFuture<'_, Vec<ExperimentConfig>>;
}

/// In-memory desired state, replaced wholesale with [`StaticSource::set`].
#[derive(Debug, Default)]
pub struct StaticSource {
    configs: RwLock<Vec<ExperimentConfig>>,
}

impl StaticSource {
    pub fn new(configs: Vec<ExperimentConfig>) -> Self {
        Self {
            configs: RwLock::new(configs),
        }
    }

    pub fn set(&self, configs: Vec<ExperimentConfig>) {
        *self.configs.write().unwrap_or_else(PoisonError::into_inner) = configs;
    }
}

impl ExperimentSource for StaticSource {
    fn desired(&self) -> SourceFuture<'_, Vec<ExperimentConfig>> {
        let configs = self
            .configs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Box::pin(async move { Ok(configs) })
    }
}

/// Re-reads the TOML config on every reconcile and yields its
/// `managed = true` experiments.
#[derive(Debug, Clone)]
pub struct ConfigFileSource {
    path: PathBuf,
}

impl ConfigFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ExperimentSource for ConfigFileSource {
    fn desired(&self) -> SourceFuture<'_, Vec<ExperimentConfig>> {
        Box::pin(async move {
            let cfg = load_and_validate(&self.path)?;
            let desired = cfg.desired_experiments();
            debug!(path = %self.path.display(), count = desired.len(), "loaded desired experiments");
            Ok(desired)
        })
    }
}
