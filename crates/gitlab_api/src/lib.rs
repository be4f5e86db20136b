//! Typed GitLab REST client crate used by the timer coordinator.

pub mod client;
pub mod config;
pub mod error;
pub mod models;

pub use client::GitLabClient;
pub use config::GitLabConfig;
pub use error::{GitLabError, Result};
pub use models::{Issue, TimeStats, User};
