//! The scenecast job lifecycle engine.
//!
//! Owns the authoritative job record store, the priority queue with its
//! lease table, the worker pool that drives the generation pipeline, and
//! the submission/cancellation service. The HTTP layer in
//! `scenecast-api` is a thin shell over [`service::JobService`].

pub mod models;
pub mod queue;
pub mod reaper;
pub mod service;
pub mod store;
pub mod worker;
