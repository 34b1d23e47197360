//! The template registry (spec §4.3, C3): loads built-in packs and project
//! overlays, resolves types/states/transitions/field schemas, and validates
//! status transitions.

pub mod builtin;
pub mod registry;
pub mod transition;

pub use registry::{RegistryError, RegistrySnapshot, TemplateRegistry};
pub use transition::{TransitionOutcome, ValidTransitionInfo};
