//! Terrain generator control surface
//!
//! `TerrainGenerator` owns the height image, configuration, and surface
//! appearance, and runs at most one generation at a time in one of three
//! modes: synchronous, background thread, or chunked over a tick source.
//! Finished meshes are handed over once through `take_mesh`, and
//! `GenerationEvent`s notify the owner of completion, cancellation, or failure.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use relief_core::{ReliefError, Result};
use relief_runtime::{EventBus, TickControl, TickHandle, TickSource};

use crate::background::AsyncGeneration;
use crate::config::TerrainConfig;
use crate::driver::generate_mesh;
use crate::field::{validate_dimensions, HeightImage};
use crate::incremental::{ChunkOutcome, ChunkedDriver};
use crate::mesh::{MeshSettings, PublishedMesh, SurfaceAppearance, TerrainMesh};

/// Generation status exposed to the owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStatus {
    Idle,
    Generating,
    Completed,
    Cancelled,
    Error,
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GenerationStatus::Idle => "Idle",
            GenerationStatus::Generating => "Generating",
            GenerationStatus::Completed => "Completed",
            GenerationStatus::Cancelled => "Cancelled",
            GenerationStatus::Error => "Error",
        };
        f.write_str(name)
    }
}

/// Notifications queued for the owner
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationEvent {
    /// Fired once per successful generation
    Completed {
        vertices: usize,
        triangles: usize,
    },
    Cancelled,
    Failed(String),
}

enum ActiveJob {
    Chunked {
        driver: ChunkedDriver,
        handle: TickHandle,
    },
    /// `cancelling` is set once the flag is raised; the job stays until the
    /// worker reports back
    Background {
        job: AsyncGeneration,
        cancelling: bool,
    },
}

struct GeneratorState {
    config: TerrainConfig,
    image: Option<Arc<HeightImage>>,
    status: GenerationStatus,
    progress: f32,
    job: Option<ActiveJob>,
    output: Option<PublishedMesh>,
    events: EventBus<GenerationEvent>,
}

impl GeneratorState {
    /// Checks shared by every start mode; nothing is allocated or locked here
    fn prepare(&self, height_scale: f32) -> Result<(Arc<HeightImage>, MeshSettings)> {
        if self.status == GenerationStatus::Generating {
            log::warn!("Terrain is already generating");
            return Err(ReliefError::Busy);
        }

        let image = self
            .image
            .clone()
            .ok_or_else(|| ReliefError::InvalidInput("no height image set".to_string()))?;
        validate_dimensions(image.width(), image.height())?;

        let settings = self.config.mesh_settings(height_scale);
        if !settings.grid_spacing.is_finite() || !settings.height_scale.is_finite() {
            return Err(ReliefError::InvalidInput(format!(
                "grid spacing and height scale must be finite, got {} and {}",
                settings.grid_spacing, settings.height_scale
            )));
        }

        log::info!(
            "Generating terrain from {}x{} height image",
            image.width(),
            image.height()
        );
        Ok((image, settings))
    }

    fn begin(&mut self, job: ActiveJob) {
        self.status = GenerationStatus::Generating;
        self.progress = 0.0;
        self.job = Some(job);
    }

    fn complete(&mut self, mesh: TerrainMesh) {
        let vertices = mesh.vertex_count();
        let triangles = mesh.triangle_count();
        log::info!(
            "Terrain generation completed: {} vertices, {} triangles",
            vertices,
            triangles
        );

        self.job = None;
        self.status = GenerationStatus::Completed;
        self.progress = 1.0;
        self.output = Some(PublishedMesh {
            mesh,
            appearance: self.config.surface.clone(),
        });
        self.events.push(GenerationEvent::Completed { vertices, triangles });
    }

    fn mark_cancelled(&mut self) {
        log::warn!("Terrain generation cancelled");
        self.job = None;
        self.status = GenerationStatus::Cancelled;
        self.progress = 0.0;
        self.events.push(GenerationEvent::Cancelled);
    }

    fn fail(&mut self, err: &ReliefError) {
        log::error!("Terrain generation failed: {}", err);
        self.job = None;
        self.status = GenerationStatus::Error;
        self.progress = 0.0;
        self.events.push(GenerationEvent::Failed(err.to_string()));
    }

    /// Start-time errors: bad input leaves the status alone, anything else is a failure
    fn reject(&mut self, err: ReliefError) -> ReliefError {
        if !matches!(err, ReliefError::InvalidInput(_) | ReliefError::Busy) {
            self.fail(&err);
        }
        err
    }

    fn on_chunk_tick(&mut self) -> TickControl {
        let outcome = match self.job.as_mut() {
            Some(ActiveJob::Chunked { driver, .. }) => {
                let outcome = driver.tick();
                self.progress = driver.progress();
                outcome
            }
            _ => return TickControl::Stop,
        };

        match outcome {
            Ok(ChunkOutcome::Pending) => TickControl::Continue,
            Ok(ChunkOutcome::Completed(mesh)) => {
                self.complete(mesh);
                TickControl::Stop
            }
            Ok(ChunkOutcome::Cancelled) => {
                self.mark_cancelled();
                TickControl::Stop
            }
            Err(e) => {
                self.fail(&e);
                TickControl::Stop
            }
        }
    }
}

/// Owner-side entry point for terrain generation.
///
/// Not `Send`: it lives on the owning context, and chunked ticks call back
/// into it from the same thread.
pub struct TerrainGenerator {
    inner: Rc<RefCell<GeneratorState>>,
}

impl Default for TerrainGenerator {
    fn default() -> Self {
        Self::new(TerrainConfig::default())
    }
}

impl TerrainGenerator {
    pub fn new(config: TerrainConfig) -> Self {
        Self {
            inner: Rc::new(RefCell::new(GeneratorState {
                config,
                image: None,
                status: GenerationStatus::Idle,
                progress: 0.0,
                job: None,
                output: None,
                events: EventBus::new(),
            })),
        }
    }

    /// Builder-style variant of `set_height_image`
    pub fn with_height_image(self, image: Arc<HeightImage>) -> Self {
        self.set_height_image(Some(image));
        self
    }

    /// Replace the source image. A running generation keeps the image it started with.
    pub fn set_height_image(&self, image: Option<Arc<HeightImage>>) {
        self.inner.borrow_mut().image = image;
    }

    pub fn has_height_image(&self) -> bool {
        self.inner.borrow().image.is_some()
    }

    /// Surface parameters attached to subsequently published meshes
    pub fn set_appearance(&self, appearance: SurfaceAppearance) {
        self.inner.borrow_mut().config.surface = appearance;
    }

    pub fn config(&self) -> TerrainConfig {
        self.inner.borrow().config.clone()
    }

    /// Generate the whole mesh before returning
    pub fn start_synchronous(&mut self, height_scale: f32) -> Result<()> {
        let mut guard = self.inner.borrow_mut();
        let state = &mut *guard;

        let (image, settings) = state.prepare(height_scale)?;
        match generate_mesh(&image, settings) {
            Ok(mesh) => {
                state.complete(mesh);
                Ok(())
            }
            Err(e) => Err(state.reject(e)),
        }
    }

    /// Generate on the worker pool; call `poll` from the owning context to collect the result
    pub fn start_async(&mut self, height_scale: f32) -> Result<()> {
        let mut guard = self.inner.borrow_mut();
        let state = &mut *guard;

        let (image, settings) = state.prepare(height_scale)?;
        let job = AsyncGeneration::spawn(image, settings).map_err(|e| state.reject(e))?;
        state.begin(ActiveJob::Background {
            job,
            cancelling: false,
        });
        Ok(())
    }

    /// Generate a bounded number of rows per tick of `ticks`
    pub fn start_chunked(&mut self, ticks: &mut dyn TickSource, height_scale: f32) -> Result<()> {
        let mut guard = self.inner.borrow_mut();
        let state = &mut *guard;

        let (image, settings) = state.prepare(height_scale)?;
        let rows_per_step = state.config.chunked.rows_per_step;
        let driver = ChunkedDriver::start(&image, settings, rows_per_step)
            .map_err(|e| state.reject(e))?;

        let weak = Rc::downgrade(&self.inner);
        let handle = ticks.schedule(
            state.config.tick_interval(),
            true,
            Box::new(move || match weak.upgrade() {
                Some(inner) => inner.borrow_mut().on_chunk_tick(),
                None => TickControl::Stop,
            }),
        );

        log::debug!(
            "Chunked generation scheduled: {} rows per tick every {:?}",
            rows_per_step,
            state.config.tick_interval()
        );
        state.begin(ActiveJob::Chunked { driver, handle });
        Ok(())
    }

    /// Cancel the running generation. Returns false if nothing was running
    /// or cancellation was already requested.
    ///
    /// Chunked generation is cancelled immediately. A background job only
    /// raises its flag; the generator stays `Generating` until `poll` sees the
    /// worker stop, and then reports `Cancelled`.
    pub fn cancel(&mut self, ticks: &mut dyn TickSource) -> bool {
        let mut state = self.inner.borrow_mut();
        if state.status != GenerationStatus::Generating {
            return false;
        }

        match state.job.take() {
            Some(ActiveJob::Chunked { mut driver, handle }) => {
                ticks.cancel(handle);
                driver.cancel();
            }
            Some(ActiveJob::Background { job, cancelling }) => {
                if !cancelling {
                    job.cancel();
                    log::debug!("Cancellation requested for background terrain job");
                }
                state.job = Some(ActiveJob::Background {
                    job,
                    cancelling: true,
                });
                return !cancelling;
            }
            None => {}
        }

        state.mark_cancelled();
        true
    }

    /// Collect background progress and results. Call once per frame.
    pub fn poll(&mut self) {
        let mut guard = self.inner.borrow_mut();
        let state = &mut *guard;

        let (result, cancelling) = match state.job.as_mut() {
            Some(ActiveJob::Background { job, cancelling }) => {
                let result = job.poll();
                if !*cancelling {
                    state.progress = job.progress();
                }
                (result, *cancelling)
            }
            _ => return,
        };

        match result {
            None => {}
            // A result that raced the flag is discarded
            Some(Ok(_)) if cancelling => state.mark_cancelled(),
            Some(Err(e)) if cancelling => {
                log::debug!("Cancelled background job ended with: {}", e);
                state.mark_cancelled();
            }
            Some(Ok(Some(mesh))) => state.complete(mesh),
            Some(Ok(None)) => state.mark_cancelled(),
            Some(Err(e)) => state.fail(&e),
        }
    }

    /// Overall progress in [0..1]
    pub fn progress(&self) -> f32 {
        self.inner.borrow().progress
    }

    pub fn status(&self) -> GenerationStatus {
        self.inner.borrow().status
    }

    pub fn is_generating(&self) -> bool {
        self.status() == GenerationStatus::Generating
    }

    /// Take the most recently published mesh; returns it only once
    pub fn take_mesh(&mut self) -> Option<PublishedMesh> {
        self.inner.borrow_mut().output.take()
    }

    /// Drain queued notifications
    pub fn drain_events(&mut self) -> Vec<GenerationEvent> {
        self.inner.borrow_mut().events.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relief_core::ColorSample;
    use relief_runtime::TimerManager;
    use std::time::{Duration, Instant};

    fn chunked_config(rows_per_step: u32) -> TerrainConfig {
        let mut config = TerrainConfig::default();
        config.chunked.rows_per_step = rows_per_step;
        config.chunked.tick_interval_ms = 10;
        config
    }

    fn generator_for(image: &Arc<HeightImage>, config: TerrainConfig) -> TerrainGenerator {
        TerrainGenerator::new(config).with_height_image(image.clone())
    }

    fn poll_until_idle(generator: &mut TerrainGenerator) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while generator.is_generating() {
            generator.poll();
            assert!(Instant::now() < deadline, "background generation did not settle");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn synchronous_generation_publishes_once() {
        let image = Arc::new(HeightImage::filled(4, 3, ColorSample::WHITE));
        let mut generator = generator_for(&image, TerrainConfig::default());

        generator.start_synchronous(100.0).unwrap();
        assert_eq!(generator.status(), GenerationStatus::Completed);
        assert_eq!(generator.progress(), 1.0);

        let published = generator.take_mesh().unwrap();
        assert_eq!(published.mesh.vertex_count(), 12);
        assert_eq!(published.mesh.triangles().next(), Some([0, 4, 1]));
        assert!(generator.take_mesh().is_none());

        assert_eq!(
            generator.drain_events(),
            vec![GenerationEvent::Completed {
                vertices: 12,
                triangles: 12
            }]
        );
    }

    #[test]
    fn missing_image_is_invalid_input() {
        let mut generator = TerrainGenerator::default();
        assert!(matches!(
            generator.start_synchronous(1.0),
            Err(ReliefError::InvalidInput(_))
        ));
        assert_eq!(generator.status(), GenerationStatus::Idle);
        assert!(generator.drain_events().is_empty());
    }

    #[test]
    fn thin_image_is_rejected_in_every_mode() {
        let image = Arc::new(HeightImage::filled(1, 8, ColorSample::WHITE));
        let mut generator = generator_for(&image, TerrainConfig::default());
        let mut timers = TimerManager::new();

        assert!(matches!(
            generator.start_synchronous(1.0),
            Err(ReliefError::InvalidInput(_))
        ));
        assert!(matches!(
            generator.start_async(1.0),
            Err(ReliefError::InvalidInput(_))
        ));
        assert!(matches!(
            generator.start_chunked(&mut timers, 1.0),
            Err(ReliefError::InvalidInput(_))
        ));
        assert_eq!(generator.status(), GenerationStatus::Idle);
        assert!(timers.is_empty());
        assert_eq!(image.lock_count(), 0);
    }

    #[test]
    fn resource_fault_sets_error_status() {
        let image = Arc::new(HeightImage::from_samples(3, 3, vec![ColorSample::WHITE; 2]));
        let mut generator = generator_for(&image, TerrainConfig::default());

        assert!(matches!(
            generator.start_synchronous(1.0),
            Err(ReliefError::ResourceFault(_))
        ));
        assert_eq!(generator.status(), GenerationStatus::Error);
        assert!(generator.take_mesh().is_none());
        assert!(matches!(
            generator.drain_events().as_slice(),
            [GenerationEvent::Failed(_)]
        ));
    }

    #[test]
    fn chunked_generation_runs_over_ticks() {
        let image = Arc::new(HeightImage::filled(6, 20, ColorSample::gray(200)));
        let mut generator = generator_for(&image, chunked_config(4));
        let mut timers = TimerManager::new();

        generator.start_chunked(&mut timers, 50.0).unwrap();
        assert_eq!(generator.status(), GenerationStatus::Generating);
        assert_eq!(timers.len(), 1);

        let mut last = 0.0;
        let mut frames = 0;
        while generator.is_generating() {
            timers.advance(0.010);
            assert!(generator.progress() >= last);
            last = generator.progress();
            frames += 1;
            assert!(frames < 100, "chunked generation did not finish");
        }

        // 5 vertex ticks + 5 index ticks, one per frame
        assert_eq!(frames, 10);
        assert_eq!(generator.status(), GenerationStatus::Completed);
        assert!(timers.is_empty());
        assert_eq!(image.release_count(), 1);

        let published = generator.take_mesh().unwrap();
        assert_eq!(published.mesh.vertex_count(), 120);
        assert_eq!(published.mesh.triangle_count(), 2 * 5 * 19);
        assert_eq!(generator.drain_events().len(), 1);
    }

    #[test]
    fn chunked_matches_synchronous_output() {
        let samples = (0..9 * 14)
            .map(|i| ColorSample::new((i * 31 % 256) as u8, (i * 3 % 256) as u8, 7, 255))
            .collect();
        let image = Arc::new(HeightImage::from_samples(9, 14, samples));

        let mut sync = generator_for(&image, chunked_config(3));
        sync.start_synchronous(-20.0).unwrap();
        let expected = sync.take_mesh().unwrap();

        let mut chunked = generator_for(&image, chunked_config(3));
        let mut timers = TimerManager::new();
        chunked.start_chunked(&mut timers, -20.0).unwrap();
        while chunked.is_generating() {
            timers.advance(0.05);
        }
        assert_eq!(chunked.take_mesh().unwrap(), expected);
    }

    #[test]
    fn second_chunked_start_is_busy() {
        let image = Arc::new(HeightImage::filled(4, 40, ColorSample::WHITE));
        let mut generator = generator_for(&image, chunked_config(2));
        let mut timers = TimerManager::new();

        generator.start_chunked(&mut timers, 1.0).unwrap();
        timers.advance(0.010);
        timers.advance(0.010);
        let progress = generator.progress();
        assert!(progress > 0.0);

        assert!(matches!(
            generator.start_chunked(&mut timers, 1.0),
            Err(ReliefError::Busy)
        ));
        assert!(matches!(generator.start_async(1.0), Err(ReliefError::Busy)));
        assert!(matches!(generator.start_synchronous(1.0), Err(ReliefError::Busy)));

        assert_eq!(generator.progress(), progress);
        assert_eq!(generator.status(), GenerationStatus::Generating);
        assert_eq!(timers.len(), 1);
        assert_eq!(image.lock_count(), 1);
    }

    #[test]
    fn cancelling_chunked_generation_publishes_nothing() {
        let image = Arc::new(HeightImage::filled(4, 40, ColorSample::WHITE));
        let mut generator = generator_for(&image, chunked_config(2));
        let mut timers = TimerManager::new();

        generator.start_chunked(&mut timers, 1.0).unwrap();
        timers.advance(0.010);
        assert!(image.is_locked());

        assert!(generator.cancel(&mut timers));
        assert_eq!(generator.status(), GenerationStatus::Cancelled);
        assert_eq!(generator.progress(), 0.0);
        assert!(timers.is_empty());
        assert!(!image.is_locked());
        assert_eq!(image.release_count(), 1);

        timers.advance(1.0);
        assert!(generator.take_mesh().is_none());
        assert_eq!(generator.drain_events(), vec![GenerationEvent::Cancelled]);
        assert!(!generator.cancel(&mut timers));
    }

    #[test]
    fn cancelled_generator_can_start_again() {
        let image = Arc::new(HeightImage::filled(3, 6, ColorSample::BLACK));
        let mut generator = generator_for(&image, chunked_config(1));
        let mut timers = TimerManager::new();

        generator.start_chunked(&mut timers, 1.0).unwrap();
        generator.cancel(&mut timers);
        generator.start_synchronous(1.0).unwrap();

        assert_eq!(generator.status(), GenerationStatus::Completed);
        assert_eq!(image.lock_count(), 2);
        assert_eq!(image.release_count(), 2);
    }

    #[test]
    fn dropping_generator_stops_its_ticks() {
        let image = Arc::new(HeightImage::filled(3, 30, ColorSample::WHITE));
        let mut timers = TimerManager::new();
        {
            let mut generator = generator_for(&image, chunked_config(1));
            generator.start_chunked(&mut timers, 1.0).unwrap();
            timers.advance(0.010);
        }

        assert!(!image.is_locked());
        timers.advance(0.010);
        assert!(timers.is_empty());
        assert_eq!(image.release_count(), 1);
    }

    #[test]
    fn async_generation_completes_through_poll() {
        let image = Arc::new(HeightImage::filled(32, 24, ColorSample::WHITE));
        let mut generator = generator_for(&image, TerrainConfig::default());
        generator.set_appearance(SurfaceAppearance {
            base_texture: Some("grass.png".to_string()),
            material: Some("terrain_base".to_string()),
        });

        generator.start_async(10.0).unwrap();
        assert!(matches!(generator.start_async(10.0), Err(ReliefError::Busy)));

        poll_until_idle(&mut generator);
        assert_eq!(generator.status(), GenerationStatus::Completed);
        let published = generator.take_mesh().unwrap();
        assert_eq!(published.mesh.vertex_count(), 32 * 24);
        assert_eq!(published.appearance.base_texture.as_deref(), Some("grass.png"));
        assert_eq!(image.release_count(), 1);
        assert_eq!(generator.drain_events().len(), 1);
    }

    #[test]
    fn cancelling_async_generation_releases_lease() {
        let image = Arc::new(HeightImage::filled(512, 512, ColorSample::WHITE));
        let mut generator = generator_for(&image, TerrainConfig::default());
        let mut timers = TimerManager::new();

        generator.start_async(1.0).unwrap();
        assert!(generator.cancel(&mut timers));
        assert!(!generator.cancel(&mut timers));
        assert!(matches!(generator.start_async(1.0), Err(ReliefError::Busy)));

        poll_until_idle(&mut generator);
        assert_eq!(generator.status(), GenerationStatus::Cancelled);
        assert_eq!(generator.progress(), 0.0);
        assert!(!image.is_locked());
        assert_eq!(image.lock_count(), image.release_count());
        assert!(generator.take_mesh().is_none());
        assert_eq!(generator.drain_events(), vec![GenerationEvent::Cancelled]);
    }

    #[test]
    fn async_cancel_returns_while_workers_are_busy() {
        let image = Arc::new(HeightImage::filled(64, 64, ColorSample::WHITE));
        let mut generator = generator_for(&image, TerrainConfig::default());
        let mut timers = TimerManager::new();

        for _ in 0..rayon::current_num_threads() {
            rayon::spawn(|| std::thread::sleep(Duration::from_millis(800)));
        }

        generator.start_async(1.0).unwrap();
        let started = Instant::now();
        assert!(generator.cancel(&mut timers));
        assert!(started.elapsed() < Duration::from_millis(200));
        assert!(generator.is_generating());

        poll_until_idle(&mut generator);
        assert_eq!(generator.status(), GenerationStatus::Cancelled);
        assert!(generator.take_mesh().is_none());
        assert_eq!(image.lock_count(), image.release_count());
        assert_eq!(generator.drain_events(), vec![GenerationEvent::Cancelled]);
    }

    #[test]
    fn non_finite_spacing_leaves_generator_idle() {
        let image = Arc::new(HeightImage::filled(4, 4, ColorSample::WHITE));
        let mut config = TerrainConfig::default();
        config.mesh.grid_spacing = f32::NAN;
        let mut generator = generator_for(&image, config);
        let mut timers = TimerManager::new();

        for _ in 0..2 {
            assert!(matches!(
                generator.start_synchronous(1.0),
                Err(ReliefError::InvalidInput(_))
            ));
        }
        assert!(matches!(
            generator.start_async(1.0),
            Err(ReliefError::InvalidInput(_))
        ));
        assert!(matches!(
            generator.start_chunked(&mut timers, 1.0),
            Err(ReliefError::InvalidInput(_))
        ));
        assert!(matches!(
            generator.start_synchronous(f32::INFINITY),
            Err(ReliefError::InvalidInput(_))
        ));

        assert_eq!(generator.status(), GenerationStatus::Idle);
        assert!(!generator.is_generating());
        assert!(timers.is_empty());
        assert_eq!(image.lock_count(), 0);
        assert!(generator.drain_events().is_empty());
    }
}
