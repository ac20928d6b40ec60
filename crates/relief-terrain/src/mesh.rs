//! Regular-grid mesh construction
//!
//! The grid is built in two independent passes so either can be run over any
//! contiguous row range: a vertex pass (positions and UVs) and an index pass
//! (two triangles per cell). Running a pass over `[0, n)` in one call or in
//! consecutive chunks yields identical buffers.

use std::ops::Range;

use relief_core::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::field::HeightField;

/// Default world-space distance between adjacent grid columns/rows
pub const DEFAULT_GRID_SPACING: f32 = 100.0;

/// Default multiplier applied to height units
pub const DEFAULT_HEIGHT_SCALE: f32 = 100.0;

/// World-space parameters for one generation run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshSettings {
    /// Distance between adjacent vertices in X and Y
    pub grid_spacing: f32,
    /// Multiplier from height unit to world Z. Negative values invert the terrain.
    pub height_scale: f32,
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self {
            grid_spacing: DEFAULT_GRID_SPACING,
            height_scale: DEFAULT_HEIGHT_SCALE,
        }
    }
}

impl MeshSettings {
    pub fn with_height_scale(height_scale: f32) -> Self {
        Self {
            height_scale,
            ..Self::default()
        }
    }
}

/// Finished (or in-progress) terrain buffers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TerrainMesh {
    /// Vertex positions in world space, row-major
    pub positions: Vec<Vec3>,
    /// Texture coordinates in [0..1], one per position
    pub uvs: Vec<Vec2>,
    /// Triangle list indices
    pub indices: Vec<u32>,
}

impl TerrainMesh {
    /// Empty buffers with capacity for a full `width × height` grid
    pub fn with_grid_capacity(width: u32, height: u32) -> Self {
        let vertices = width as usize * height as usize;
        let cells = (width.saturating_sub(1) as usize) * (height.saturating_sub(1) as usize);
        Self {
            positions: Vec::with_capacity(vertices),
            uvs: Vec::with_capacity(vertices),
            indices: Vec::with_capacity(cells * 6),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Iterate triangles as index triples
    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }

    /// Axis-aligned bounds of all positions, or `None` when empty
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.positions.first()?;
        Some(
            self.positions
                .iter()
                .fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p))),
        )
    }

    /// Release all buffer memory
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Opaque surface parameters handed to the mesh consumer alongside the buffers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceAppearance {
    /// Texture bound to the material's base texture slot
    #[serde(default)]
    pub base_texture: Option<String>,
    /// Material the surface texture is applied to
    #[serde(default)]
    pub material: Option<String>,
}

/// A completed mesh handed over to its consumer
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMesh {
    pub mesh: TerrainMesh,
    pub appearance: SurfaceAppearance,
}

/// Emit vertices and UVs for the rows in `rows` (clamped to the field height),
/// appending in row-major order.
pub fn append_vertex_rows(
    field: &HeightField<'_>,
    rows: Range<u32>,
    settings: &MeshSettings,
    positions: &mut Vec<Vec3>,
    uvs: &mut Vec<Vec2>,
) {
    let width = field.width();
    let height = field.height();
    let end = rows.end.min(height);

    let u_den = (width - 1) as f32;
    let v_den = (height - 1) as f32;

    for y in rows.start..end {
        let world_y = y as f32 * settings.grid_spacing;
        let v = y as f32 / v_den;

        for x in 0..width {
            let z = field.height_at(x, y) * settings.height_scale;
            positions.push(Vec3::new(x as f32 * settings.grid_spacing, world_y, z));
            uvs.push(Vec2::new(x as f32 / u_den, v));
        }
    }
}

/// Emit triangle indices for the cell rows in `rows` (clamped to `height - 1`).
///
/// For the cell with top-left vertex `i0`, with `i1 = i0 + 1`,
/// `i2 = i0 + width` and `i3 = i2 + 1`, the triangles are `(i0, i2, i1)` and
/// `(i1, i2, i3)`. This winding decides the face normal direction and must not change.
pub fn append_index_rows(width: u32, height: u32, rows: Range<u32>, indices: &mut Vec<u32>) {
    let end = rows.end.min(height.saturating_sub(1));

    for y in rows.start..end {
        for x in 0..width.saturating_sub(1) {
            let i0 = y * width + x;
            let i1 = i0 + 1;
            let i2 = i0 + width;
            let i3 = i2 + 1;

            indices.extend_from_slice(&[i0, i2, i1]);
            indices.extend_from_slice(&[i1, i2, i3]);
        }
    }
}

/// Build the complete grid in one call
pub fn build_grid(field: &HeightField<'_>, settings: &MeshSettings) -> TerrainMesh {
    let mut mesh = TerrainMesh::with_grid_capacity(field.width(), field.height());
    append_vertex_rows(
        field,
        0..field.height(),
        settings,
        &mut mesh.positions,
        &mut mesh.uvs,
    );
    append_index_rows(field.width(), field.height(), 0..field.height(), &mut mesh.indices);
    mesh
}
