//! Merge rules: defaults, override order, conflict handling.

use crate::config::{default_concurrency, default_git_binary, default_timeout_secs, default_user_agent};
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("fetch.concurrency", default_concurrency() as u64)?
        .set_default("fetch.timeout_secs", default_timeout_secs())?
        .set_default("fetch.git_binary", default_git_binary())?
        .set_default("fetch.user_agent", default_user_agent())
}
