//! Relief Core - Foundational types for the Relief terrain generator
//!
//! This crate provides the types that all other Relief crates depend on:
//! - `ColorSample` - 8-bit-per-channel RGBA pixel
//! - `Vec3`, `Vec2` - Spatial types for mesh buffers
//! - Error types and Result alias

mod error;
mod types;

pub use error::{ReliefError, Result};
pub use types::{ColorSample, Vec2, Vec3};
