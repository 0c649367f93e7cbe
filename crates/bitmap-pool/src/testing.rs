//! Instrumented bitmap for unit tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::bitmap::{Bitmap, PixelFormat, Shape};

/// Bitmap without pixel storage that records what the pool did to it
#[derive(Debug, Clone)]
pub(crate) struct FakeBitmap {
    pub id: u32,
    pub shape: Shape,
    pub allocation: usize,
    pub mutable: bool,
    pub recycled: bool,
    pub erased: bool,
    pub flags_reset: bool,
    /// Shared across clones so tests can count destructions after handing the bitmap over
    pub recycle_count: Arc<AtomicUsize>,
    /// When set, `byte_size` reports this value instead of `allocation`
    pub reported_size: Option<Arc<AtomicUsize>>,
}

impl FakeBitmap {
    pub fn new(id: u32, width: u32, height: u32, format: PixelFormat) -> Self {
        let shape = Shape::new(width, height, format);
        Self {
            id,
            shape,
            allocation: shape.byte_size(),
            mutable: true,
            recycled: false,
            erased: false,
            flags_reset: false,
            recycle_count: Arc::new(AtomicUsize::new(0)),
            reported_size: None,
        }
    }

    /// A bitmap whose allocation is `size` bytes regardless of its shape
    pub fn sized(id: u32, size: usize, format: PixelFormat) -> Self {
        Self {
            allocation: size,
            ..Self::new(id, 1, 1, format)
        }
    }
}

impl Bitmap for FakeBitmap {
    fn allocate(shape: Shape) -> Self {
        Self::new(0, shape.width, shape.height, shape.format)
    }

    fn shape(&self) -> Shape {
        self.shape
    }

    fn byte_size(&self) -> usize {
        match &self.reported_size {
            Some(size) => size.load(Ordering::SeqCst),
            None => self.allocation,
        }
    }

    fn is_mutable(&self) -> bool {
        self.mutable
    }

    fn is_recycled(&self) -> bool {
        self.recycled
    }

    fn reconfigure(&mut self, shape: Shape) {
        self.allocation = self.allocation.max(shape.byte_size());
        self.shape = shape;
    }

    fn recycle(&mut self) {
        self.recycled = true;
        self.recycle_count.fetch_add(1, Ordering::SeqCst);
    }

    fn erase(&mut self) {
        self.erased = true;
    }

    fn reset_reuse_flags(&mut self) {
        self.flags_reset = true;
    }
}

/// Bitmap type that cannot be reconfigured in place
#[derive(Debug, Clone)]
pub(crate) struct FixedBitmap(pub FakeBitmap);

impl Bitmap for FixedBitmap {
    const SUPPORTS_RECONFIGURE: bool = false;

    fn allocate(shape: Shape) -> Self {
        FixedBitmap(FakeBitmap::allocate(shape))
    }

    fn shape(&self) -> Shape {
        self.0.shape()
    }

    fn byte_size(&self) -> usize {
        self.0.byte_size()
    }

    fn is_mutable(&self) -> bool {
        self.0.is_mutable()
    }

    fn is_recycled(&self) -> bool {
        self.0.is_recycled()
    }

    fn reconfigure(&mut self, shape: Shape) {
        self.0.reconfigure(shape)
    }

    fn recycle(&mut self) {
        self.0.recycle()
    }

    fn erase(&mut self) {
        self.0.erase()
    }

    fn reset_reuse_flags(&mut self) {
        self.0.reset_reuse_flags()
    }
}
