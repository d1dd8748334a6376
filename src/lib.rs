//! Mountplan: Profile Compilation and Portable Mount Plans
//!
//! Resolves declarative session profiles into compiled, type-organized module
//! trees backed by a revision- and content-addressed artifact cache, and turns
//! compiled profiles into mount plans whose modules are located through
//! relocatable `collection/profile` hints.

pub mod cache;
pub mod cli;
pub mod collection;
pub mod concurrency;
pub mod config;
pub mod error;
pub mod logging;
pub mod mount;
pub mod plan;
pub mod profile;
pub mod reference;
pub mod resolver;
pub mod tree;
pub mod types;
pub mod workspace;

pub use error::{
    ApiError, CompilationError, FetchError, ProfileNotCompiledError, ResolutionError,
};
pub use plan::{MountPlan, MountPlanGenerator};
pub use profile::{CompiledProfile, ProfileCompiler, ProfileStatus};
pub use reference::Reference;
pub use resolver::{ModuleResolver, ModuleSource};
pub use types::ProfileId;
pub use workspace::Workspace;
