//! Command handlers for the `filigree` CLI, one module per command group.

pub mod analytics;
pub mod batch;
pub mod claim;
pub mod collab;
pub mod completion;
pub mod config_cmd;
pub mod dep;
pub mod doctor;
pub mod events;
pub mod file;
pub mod init;
pub mod issue;
pub mod plan;
pub mod summary;
pub mod template;
