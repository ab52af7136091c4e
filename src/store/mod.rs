// src/store/mod.rs

//! Storage collaborator interface.
//!
//! Persistence of experiment records is owned outside the orchestration
//! core; the executor only needs to load a record and move its status
//! forward. [`memory::InMemoryStore`] is the implementation the binary and
//! the tests use.

use std::future::Future;
use std::pin::Pin;

use crate::errors::Result;
use crate::experiment::Experiment;
use crate::types::ExperimentStatus;

pub mod memory;

pub use memory::InMemoryStore;

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

pub trait ExperimentStore: Send + Sync {
    /// Load an experiment record; `ExperimentNotFound` if absent.
    fn get<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Experiment>;

    /// Move an experiment to `status`.
    ///
    /// Implementations reject transitions that would move the status
    /// backwards with `InvalidTransition`.
    fn update_status<'a>(&'a self, id: &'a str, status: ExperimentStatus) -> StoreFuture<'a, ()>;
}
