//! Background-thread generation
//!
//! The job runs on the rayon pool and reports back over a channel. The only
//! state shared with the owner is the cancellation flag; the finished buffers
//! are moved through the channel, never exposed partially.

use std::sync::Arc;

use crossbeam::channel::{self, Receiver, TryRecvError};
use relief_core::{ReliefError, Result};

use crate::driver::generate_blocking;
use crate::field::{validate_dimensions, HeightImage};
use crate::mesh::{MeshSettings, TerrainMesh};
use crate::session::CancelFlag;

/// Minimum progress change between two progress messages
const PROGRESS_GRANULARITY: f32 = 0.01;

/// Messages sent from the worker to the owning context
#[derive(Debug)]
pub enum WorkerMessage {
    Progress(f32),
    /// `Ok(None)` means the job observed cancellation
    Finished(Result<Option<TerrainMesh>>),
}

/// A generation job running on a worker thread
pub struct AsyncGeneration {
    receiver: Receiver<WorkerMessage>,
    cancel: CancelFlag,
    progress: f32,
    finished: bool,
}

impl AsyncGeneration {
    /// Validate input and hand the job to the worker pool.
    ///
    /// The worker advances one row at a time, so the cancel flag is polled
    /// after every row.
    pub fn spawn(image: Arc<HeightImage>, settings: MeshSettings) -> Result<Self> {
        validate_dimensions(image.width(), image.height())?;

        let (sender, receiver) = channel::unbounded();
        let cancel = CancelFlag::new();
        let worker_cancel = cancel.clone();

        rayon::spawn(move || {
            let mut last_sent = 0.0f32;
            let result = generate_blocking(&image, settings, 1, Some(&worker_cancel), |p| {
                if p - last_sent >= PROGRESS_GRANULARITY {
                    last_sent = p;
                    // The owner may have dropped the receiver after cancelling
                    let _ = sender.send(WorkerMessage::Progress(p));
                }
            });
            if let Err(e) = &result {
                log::error!("Background terrain generation failed: {}", e);
            }
            let _ = sender.send(WorkerMessage::Finished(result));
        });

        Ok(Self {
            receiver,
            cancel,
            progress: 0.0,
            finished: false,
        })
    }

    /// Ask the worker to stop after its current row
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Latest progress reported by the worker
    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Drain pending messages without blocking.
    /// Returns the job result once, when the worker has finished.
    pub fn poll(&mut self) -> Option<Result<Option<TerrainMesh>>> {
        if self.finished {
            return None;
        }

        loop {
            match self.receiver.try_recv() {
                Ok(message) => {
                    if let Some(result) = self.handle(message) {
                        return Some(result);
                    }
                }
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => return Some(self.lost_worker()),
            }
        }
    }

    /// Block until the worker finishes
    pub fn wait(mut self) -> Result<Option<TerrainMesh>> {
        if self.finished {
            return Err(ReliefError::NotReady(
                "background result was already taken".to_string(),
            ));
        }

        while let Ok(message) = self.receiver.recv() {
            if let Some(result) = self.handle(message) {
                return result;
            }
        }
        self.lost_worker()
    }

    fn handle(&mut self, message: WorkerMessage) -> Option<Result<Option<TerrainMesh>>> {
        match message {
            WorkerMessage::Progress(p) => {
                self.progress = p;
                None
            }
            WorkerMessage::Finished(result) => {
                self.finished = true;
                if matches!(result, Ok(Some(_))) {
                    self.progress = 1.0;
                }
                Some(result)
            }
        }
    }

    fn lost_worker(&mut self) -> Result<Option<TerrainMesh>> {
        self.finished = true;
        Err(ReliefError::ResourceFault(
            "terrain worker exited without a result".to_string(),
        ))
    }
}

impl Drop for AsyncGeneration {
    /// A job nobody will poll stops at its next row
    fn drop(&mut self) {
        if !self.finished {
            self.cancel.cancel();
        }
    }
}
