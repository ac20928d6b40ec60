//! Height images, scoped leases over their samples, and validated height fields

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use relief_core::{ColorSample, ReliefError, Result};

use crate::sampler::sample_height;

/// Smallest grid edge that can form a triangle
pub const MIN_DIMENSION: u32 = 2;

/// Largest accepted grid edge; bounds buffer memory
pub const MAX_DIMENSION: u32 = 4097;

/// Check that a `width × height` grid can be triangulated and is within the size cap.
pub fn validate_dimensions(width: u32, height: u32) -> Result<()> {
    if width < MIN_DIMENSION || height < MIN_DIMENSION {
        return Err(ReliefError::InvalidInput(format!(
            "height field must be at least {0}x{0}, got {1}x{2}",
            MIN_DIMENSION, width, height
        )));
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(ReliefError::InvalidInput(format!(
            "height field {}x{} exceeds the {}x{} limit",
            width, height, MAX_DIMENSION, MAX_DIMENSION
        )));
    }
    Ok(())
}

/// A decoded RGBA8 image used as the source of terrain heights.
///
/// Samples are only read through a [`FieldLease`]. At most one lease may be
/// outstanding, and every lease is released exactly once when dropped; the
/// counters make both facts observable.
#[derive(Debug)]
pub struct HeightImage {
    width: u32,
    height: u32,
    /// Row-major samples
    samples: Vec<ColorSample>,
    locked: AtomicBool,
    lock_count: AtomicUsize,
    release_count: AtomicUsize,
}

impl HeightImage {
    /// Wrap already-decoded samples. The sample count is checked when leased,
    /// not here, so a mismatched image surfaces as a `ResourceFault`.
    pub fn from_samples(width: u32, height: u32, samples: Vec<ColorSample>) -> Self {
        Self {
            width,
            height,
            samples,
            locked: AtomicBool::new(false),
            lock_count: AtomicUsize::new(0),
            release_count: AtomicUsize::new(0),
        }
    }

    /// Build from tightly packed RGBA8 bytes
    pub fn from_rgba8(width: u32, height: u32, bytes: &[u8]) -> Result<Self> {
        if bytes.len() % 4 != 0 {
            return Err(ReliefError::ImageError(format!(
                "RGBA8 buffer length {} is not a multiple of 4",
                bytes.len()
            )));
        }
        let samples = bytes
            .chunks_exact(4)
            .map(|px| ColorSample::new(px[0], px[1], px[2], px[3]))
            .collect();
        Ok(Self::from_samples(width, height, samples))
    }

    /// Uniform image, handy for flat terrain and tests
    pub fn filled(width: u32, height: u32, sample: ColorSample) -> Self {
        Self::from_samples(width, height, vec![sample; width as usize * height as usize])
    }

    /// Load and decode an image file. Any format the `image` crate
    /// understands is accepted and converted to RGBA8.
    pub fn open(path: &Path) -> Result<Self> {
        let img = image::open(path).map_err(|e| {
            ReliefError::ImageError(format!(
                "Failed to load height image '{}': {}",
                path.display(),
                e
            ))
        })?;

        let rgba = img.into_rgba8();
        let (width, height) = rgba.dimensions();
        let samples = rgba.pixels().map(|p| ColorSample::from_array(p.0)).collect();

        log::debug!("Loaded height image {} ({}x{})", path.display(), width, height);
        Ok(Self::from_samples(width, height, samples))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Acquire exclusive read access to the samples.
    ///
    /// Fails with `InvalidInput` for untriangulable dimensions and with
    /// `ResourceFault` if the sample count does not match the declared size
    /// or a lease is already outstanding.
    pub fn lock(self: &Arc<Self>) -> Result<FieldLease> {
        validate_dimensions(self.width, self.height)?;

        let expected = self.width as usize * self.height as usize;
        if self.samples.len() != expected {
            return Err(ReliefError::ResourceFault(format!(
                "expected {} samples for {}x{}, found {}",
                expected,
                self.width,
                self.height,
                self.samples.len()
            )));
        }

        if self
            .locked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ReliefError::ResourceFault(
                "height image is already locked".to_string(),
            ));
        }

        self.lock_count.fetch_add(1, Ordering::Relaxed);
        Ok(FieldLease {
            image: Arc::clone(self),
        })
    }

    /// Whether a lease is currently outstanding
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    /// Number of successful `lock` calls
    pub fn lock_count(&self) -> usize {
        self.lock_count.load(Ordering::Relaxed)
    }

    /// Number of leases released
    pub fn release_count(&self) -> usize {
        self.release_count.load(Ordering::Relaxed)
    }

    fn release(&self) {
        self.release_count.fetch_add(1, Ordering::Relaxed);
        self.locked.store(false, Ordering::Release);
    }
}

/// Scoped read access to a [`HeightImage`]; released on drop.
#[derive(Debug)]
pub struct FieldLease {
    image: Arc<HeightImage>,
}

impl FieldLease {
    /// View the leased samples as a height field
    pub fn field(&self) -> HeightField<'_> {
        HeightField {
            width: self.image.width,
            height: self.image.height,
            samples: &self.image.samples,
        }
    }
}

impl Drop for FieldLease {
    fn drop(&mut self) {
        self.image.release();
        log::trace!(
            "Released height image lease ({}x{})",
            self.image.width,
            self.image.height
        );
    }
}

/// Read-only `width × height` grid of color samples with validated dimensions
#[derive(Debug, Clone, Copy)]
pub struct HeightField<'a> {
    width: u32,
    height: u32,
    samples: &'a [ColorSample],
}

impl<'a> HeightField<'a> {
    /// Create a field over borrowed samples
    pub fn new(width: u32, height: u32, samples: &'a [ColorSample]) -> Result<Self> {
        validate_dimensions(width, height)?;
        let expected = width as usize * height as usize;
        if samples.len() != expected {
            return Err(ReliefError::ResourceFault(format!(
                "expected {} samples for {}x{}, found {}",
                expected,
                width,
                height,
                samples.len()
            )));
        }
        Ok(Self {
            width,
            height,
            samples,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw sample at grid coordinates
    pub fn sample(&self, x: u32, y: u32) -> ColorSample {
        self.samples[(y as usize) * (self.width as usize) + x as usize]
    }

    /// Height unit in [0..1] at grid coordinates
    pub fn height_at(&self, x: u32, y: u32) -> f32 {
        sample_height(self.sample(x, y))
    }

    /// Lowest and highest height unit in the field
    pub fn height_range(&self) -> (f32, f32) {
        self.samples
            .iter()
            .map(|s| sample_height(*s))
            .fold((f32::MAX, f32::MIN), |(lo, hi), h| (lo.min(h), hi.max(h)))
    }
}
