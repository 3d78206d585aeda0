//! Resumable, multi-stage plan generation on top of a structured-output
//! completion service.
//!
//! A run goes through planning, detailing and aggregating, checkpointing
//! after every unit so an interrupted run picks up where it stopped. The
//! finished draft can be edited slot by slot or group by group before it
//! is accepted.

pub mod assistant;
pub mod completion;
pub mod config;
pub mod credentials;
pub mod domain;
pub mod editor;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod provider;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;
