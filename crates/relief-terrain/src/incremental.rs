//! Time-sliced generation driver
//!
//! Each tick performs exactly one bounded advance of the session, so a frame
//! loop can spread a large grid across many frames.

use std::sync::Arc;

use relief_core::{ReliefError, Result};

use crate::field::HeightImage;
use crate::mesh::{MeshSettings, TerrainMesh};
use crate::session::{GenerationSession, SessionState};

/// What a single tick produced
#[derive(Debug)]
pub enum ChunkOutcome {
    /// More ticks are needed
    Pending,
    /// The mesh was published; the driver is finished
    Completed(TerrainMesh),
    /// Cancellation was observed; nothing is published
    Cancelled,
}

/// Drives one session a fixed number of rows per tick
pub struct ChunkedDriver {
    session: GenerationSession,
    rows_per_step: u32,
}

impl ChunkedDriver {
    /// Start a session over `image`
    pub fn start(
        image: &Arc<HeightImage>,
        settings: MeshSettings,
        rows_per_step: u32,
    ) -> Result<Self> {
        if rows_per_step == 0 {
            return Err(ReliefError::InvalidInput(
                "rows per step must be positive".to_string(),
            ));
        }

        let mut session = GenerationSession::new();
        session.start(image, settings)?;
        Ok(Self {
            session,
            rows_per_step,
        })
    }

    /// Run one advance of whichever phase is current
    pub fn tick(&mut self) -> Result<ChunkOutcome> {
        match self.session.advance(self.rows_per_step)? {
            SessionState::Completed => Ok(ChunkOutcome::Completed(self.session.publish()?)),
            SessionState::Cancelled => Ok(ChunkOutcome::Cancelled),
            _ => Ok(ChunkOutcome::Pending),
        }
    }

    /// Cancel immediately, releasing the lease if still held
    pub fn cancel(&mut self) {
        self.session.request_cancel();
        self.session.observe_cancel();
    }

    pub fn progress(&self) -> f32 {
        self.session.progress()
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn rows_per_step(&self) -> u32 {
        self.rows_per_step
    }
}
