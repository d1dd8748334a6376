//! Artifact trees on disk
//!
//! Deterministic hashing, sorted walking, and stage-then-rename publication
//! shared by the artifact cache and the profile compiler.

pub mod hasher;
pub mod path;
pub mod publish;
pub mod walker;
