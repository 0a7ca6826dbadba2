//! metaresolve - canonical metadata resolution for music collections.
//!
//! Shared modules for the `metaresolve` and `resolve-title` binaries.

pub mod combine;
pub mod config;
pub mod error;
pub mod fetch;
pub mod genre;
pub mod item;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod progress;
pub mod rate_limit;
pub mod reference;
pub mod scoring;
pub mod sources;
pub mod state;
pub mod tags;
pub mod title;
