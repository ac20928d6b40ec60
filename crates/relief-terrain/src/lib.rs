//! Relief Terrain - Incremental heightmap-to-mesh generation
//!
//! Converts a decoded color image into a regular grid mesh (positions, UVs,
//! triangle indices) where each pixel's luminance sets vertex elevation.
//! Generation runs through a `GenerationSession` state machine that can be
//! driven to completion in one call, on a worker thread, or a bounded number
//! of rows per tick of an injected `TickSource`. Does not render anything;
//! published buffers are handed to whoever consumes the mesh.

pub mod background;
pub mod config;
pub mod driver;
pub mod field;
pub mod generator;
pub mod incremental;
pub mod mesh;
pub mod sampler;
pub mod session;

pub use background::AsyncGeneration;
pub use config::TerrainConfig;
pub use driver::{generate_blocking, generate_mesh};
pub use field::{FieldLease, HeightField, HeightImage, MAX_DIMENSION, MIN_DIMENSION};
pub use generator::{GenerationEvent, GenerationStatus, TerrainGenerator};
pub use incremental::{ChunkOutcome, ChunkedDriver};
pub use mesh::{MeshSettings, PublishedMesh, SurfaceAppearance, TerrainMesh};
pub use sampler::sample_height;
pub use session::{CancelFlag, GenerationSession, SessionState};
