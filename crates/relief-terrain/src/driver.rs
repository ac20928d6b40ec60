//! Synchronous generation driver

use std::sync::Arc;

use relief_core::Result;

use crate::field::HeightImage;
use crate::mesh::{MeshSettings, TerrainMesh};
use crate::session::{CancelFlag, GenerationSession, SessionState};

/// Step size that covers any remaining range in one advance
pub const WHOLE_RANGE: u32 = u32::MAX;

/// Run a generation session to completion on the calling thread.
///
/// `cancel` is checked before every advance, so with `WHOLE_RANGE` it is
/// observed exactly between the vertex and index phases; smaller steps check
/// it more often. Returns `Ok(None)` when cancelled. `on_progress` receives
/// the progress after each non-final advance.
pub fn generate_blocking(
    image: &Arc<HeightImage>,
    settings: MeshSettings,
    rows_per_step: u32,
    cancel: Option<&CancelFlag>,
    mut on_progress: impl FnMut(f32),
) -> Result<Option<TerrainMesh>> {
    let mut session = GenerationSession::new();
    session.start(image, settings)?;

    loop {
        if cancel.is_some_and(|c| c.is_cancelled()) {
            session.request_cancel();
        }

        match session.advance(rows_per_step)? {
            SessionState::Completed => return session.publish().map(Some),
            SessionState::Cancelled => return Ok(None),
            _ => on_progress(session.progress()),
        }
    }
}

/// Generate the whole mesh in one blocking call
pub fn generate_mesh(image: &Arc<HeightImage>, settings: MeshSettings) -> Result<TerrainMesh> {
    let mesh = generate_blocking(image, settings, WHOLE_RANGE, None, |_| {})?;
    // Without a cancel flag the session can only end Completed
    Ok(mesh.unwrap_or_default())
}
