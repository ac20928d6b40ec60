//! Generation session state machine
//!
//! A session turns a leased height image into mesh buffers over many small
//! advance calls:
//!
//! ```text
//! Idle -> VertexPhase -> IndexPhase -> Completed -> (publish) -> Idle
//!             |               |
//!             +-> Cancelled <-+
//! ```
//!
//! The height image lease is held only during the vertex phase and is
//! released exactly once, at the vertex/index transition or when the session
//! is cancelled, faults, resets, or is dropped.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use relief_core::{ReliefError, Result};

use crate::field::{validate_dimensions, FieldLease, HeightImage};
use crate::mesh::{append_index_rows, append_vertex_rows, MeshSettings, TerrainMesh};

/// Share of total progress covered by the vertex phase
pub const VERTEX_PHASE_BUDGET: f32 = 0.9;

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    VertexPhase,
    IndexPhase,
    Completed,
    Cancelled,
}

impl SessionState {
    /// Generation work remains
    pub fn is_active(self) -> bool {
        matches!(self, SessionState::VertexPhase | SessionState::IndexPhase)
    }

    /// Completed or Cancelled
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Cancelled)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::VertexPhase => "vertex phase",
            SessionState::IndexPhase => "index phase",
            SessionState::Completed => "completed",
            SessionState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Cooperative cancellation flag, safe to set from any thread
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// In-progress terrain generation: buffers, cursors, progress, and lease
pub struct GenerationSession {
    state: SessionState,
    /// Held from `start` until the vertex phase finishes
    lease: Option<FieldLease>,
    width: u32,
    height: u32,
    settings: MeshSettings,
    mesh: TerrainMesh,
    /// Next row to emit vertices for
    vertex_row: u32,
    /// Next cell row to emit triangles for
    index_row: u32,
    cancel: CancelFlag,
    progress: f32,
}

impl Default for GenerationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            lease: None,
            width: 0,
            height: 0,
            settings: MeshSettings::default(),
            mesh: TerrainMesh::default(),
            vertex_row: 0,
            index_row: 0,
            cancel: CancelFlag::new(),
            progress: 0.0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Overall progress in [0..1]
    pub fn progress(&self) -> f32 {
        self.progress
    }

    /// Handle that can request cancellation from elsewhere
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn vertex_row(&self) -> u32 {
        self.vertex_row
    }

    pub fn index_row(&self) -> u32 {
        self.index_row
    }

    /// Whether the height image lease is still held
    pub fn holds_lease(&self) -> bool {
        self.lease.is_some()
    }

    /// Begin generating from `image`.
    ///
    /// Input is validated before anything is allocated or locked; on
    /// `InvalidInput` the session is left untouched. A lease failure moves the
    /// session to `Cancelled`.
    pub fn start(&mut self, image: &Arc<HeightImage>, settings: MeshSettings) -> Result<()> {
        if self.state.is_active() || self.state == SessionState::Completed {
            return Err(ReliefError::Busy);
        }

        validate_dimensions(image.width(), image.height())?;
        if !settings.grid_spacing.is_finite() || !settings.height_scale.is_finite() {
            return Err(ReliefError::InvalidInput(format!(
                "grid spacing and height scale must be finite, got {} and {}",
                settings.grid_spacing, settings.height_scale
            )));
        }

        self.reset();

        let lease = match image.lock() {
            Ok(lease) => lease,
            Err(e) => {
                log::error!("Failed to lease height image: {}", e);
                self.state = SessionState::Cancelled;
                return Err(e);
            }
        };

        self.width = image.width();
        self.height = image.height();
        self.settings = settings;
        self.mesh = TerrainMesh::with_grid_capacity(self.width, self.height);
        self.lease = Some(lease);
        self.state = SessionState::VertexPhase;

        log::debug!(
            "Generation session started ({}x{}, scale {})",
            self.width,
            self.height,
            settings.height_scale
        );
        Ok(())
    }

    /// Emit vertices for up to `rows_per_step` more rows.
    /// Releases the lease and enters `IndexPhase` after the last row.
    pub fn advance_vertex_phase(&mut self, rows_per_step: u32) -> Result<SessionState> {
        check_step(rows_per_step)?;
        if self.observe_cancel() {
            return Ok(self.state);
        }
        self.expect_state(SessionState::VertexPhase)?;

        let Some(lease) = self.lease.as_ref() else {
            return Err(self.fault("height image lease missing during vertex phase"));
        };

        let start = self.vertex_row;
        let end = start.saturating_add(rows_per_step).min(self.height);
        append_vertex_rows(
            &lease.field(),
            start..end,
            &self.settings,
            &mut self.mesh.positions,
            &mut self.mesh.uvs,
        );
        self.vertex_row = end;
        self.progress = VERTEX_PHASE_BUDGET * end as f32 / self.height as f32;

        if end >= self.height {
            self.lease = None;
            self.state = SessionState::IndexPhase;
            log::debug!("Vertex phase finished: {} vertices", self.mesh.vertex_count());
        }

        Ok(self.state)
    }

    /// Emit triangles for up to `rows_per_step` more cell rows.
    /// Enters `Completed` after the last cell row.
    pub fn advance_index_phase(&mut self, rows_per_step: u32) -> Result<SessionState> {
        check_step(rows_per_step)?;
        if self.observe_cancel() {
            return Ok(self.state);
        }
        self.expect_state(SessionState::IndexPhase)?;

        let cell_rows = self.height - 1;
        let start = self.index_row;
        let end = start.saturating_add(rows_per_step).min(cell_rows);
        append_index_rows(self.width, self.height, start..end, &mut self.mesh.indices);
        self.index_row = end;
        self.progress =
            VERTEX_PHASE_BUDGET + (1.0 - VERTEX_PHASE_BUDGET) * end as f32 / cell_rows as f32;

        if end >= cell_rows {
            self.state = SessionState::Completed;
            self.progress = 1.0;
            log::debug!("Index phase finished: {} triangles", self.mesh.triangle_count());
        }

        Ok(self.state)
    }

    /// Advance whichever phase is current. Idle and terminal sessions are left as they are.
    pub fn advance(&mut self, rows_per_step: u32) -> Result<SessionState> {
        check_step(rows_per_step)?;
        self.observe_cancel();
        match self.state {
            SessionState::VertexPhase => self.advance_vertex_phase(rows_per_step),
            SessionState::IndexPhase => self.advance_index_phase(rows_per_step),
            other => Ok(other),
        }
    }

    /// Request cancellation; observed by the next advance or `observe_cancel`.
    /// Has no effect unless the session is active.
    pub fn request_cancel(&self) {
        if self.state.is_active() {
            self.cancel.cancel();
        }
    }

    /// Apply a pending cancellation now: release the lease, discard buffers,
    /// and enter `Cancelled`. Returns true if the session is cancelled.
    pub fn observe_cancel(&mut self) -> bool {
        if self.state.is_active() && self.cancel.is_cancelled() {
            self.lease = None;
            self.mesh.clear();
            self.progress = 0.0;
            self.state = SessionState::Cancelled;
            log::debug!(
                "Generation cancelled at vertex row {}, index row {}",
                self.vertex_row,
                self.index_row
            );
        }
        self.state == SessionState::Cancelled
    }

    /// Hand the finished buffers to the caller and return to `Idle`.
    pub fn publish(&mut self) -> Result<TerrainMesh> {
        if self.state != SessionState::Completed {
            return Err(ReliefError::NotReady(format!(
                "cannot publish while session is {}",
                self.state
            )));
        }

        let mesh = std::mem::take(&mut self.mesh);
        self.reset();
        Ok(mesh)
    }

    /// Discard everything and return to `Idle`
    pub fn reset(&mut self) {
        self.lease = None;
        self.mesh.clear();
        self.width = 0;
        self.height = 0;
        self.vertex_row = 0;
        self.index_row = 0;
        self.progress = 0.0;
        self.cancel.clear();
        self.state = SessionState::Idle;
    }

    fn expect_state(&self, expected: SessionState) -> Result<()> {
        if self.state != expected {
            return Err(ReliefError::NotReady(format!(
                "cannot advance {} while session is {}",
                expected, self.state
            )));
        }
        Ok(())
    }

    fn fault(&mut self, message: &str) -> ReliefError {
        log::error!("Generation session fault: {}", message);
        self.lease = None;
        self.mesh.clear();
        self.progress = 0.0;
        self.state = SessionState::Cancelled;
        ReliefError::ResourceFault(message.to_string())
    }
}

fn check_step(rows_per_step: u32) -> Result<()> {
    if rows_per_step == 0 {
        return Err(ReliefError::InvalidInput(
            "rows per step must be positive".to_string(),
        ));
    }
    Ok(())
}
