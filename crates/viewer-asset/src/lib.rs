//! Model loading for the character viewer.
//!
//! A model is described by a `model3.json` descriptor that references
//! geometry, expression and motion clips, physics and pose rules, user data
//! and textures. [`orchestrator::LoadOrchestrator`] sequences these loads as
//! an explicit state machine, [`loader::ModelLoader`] runs the fetches on a
//! tokio runtime, and [`cache::ResourceCache`] shares decoded textures
//! between models and reloads.
//!
pub mod cache;
pub mod clip;
pub mod config;
pub mod descriptor;
pub mod effect;
pub mod error;
pub mod fetch;
pub mod gate;
pub mod index;
pub mod loader;
pub mod orchestrator;
pub mod runtime;
pub mod scene;
pub mod texture;

#[cfg(test)]
mod fixtures;
