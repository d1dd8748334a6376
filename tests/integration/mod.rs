//! Integration tests for profile compilation, mount plans and module resolution

mod compile_profiles;
mod config_integration;
mod inheritance;
mod test_utils;
