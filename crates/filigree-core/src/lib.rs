//! Core domain types for the Filigree issue tracker.
//!
//! This crate has no storage or I/O dependencies; it defines the shapes
//! engines and boundary adapters pass around, plus the identifier, time, and
//! error-taxonomy primitives every other crate builds on.

pub mod error;
pub mod events;
pub mod fields;
pub mod files;
pub mod idgen;
pub mod issue;
pub mod plan;
pub mod template;
pub mod time;
pub mod validation;
