//! Pixel buffers managed by the pool
//!
//! The pool never looks inside a bitmap. It only needs the narrow capability
//! set expressed by the [`Bitmap`] trait: byte sizes, format, in-place
//! reconfiguration and destruction. [`HeapBitmap`] is a plain `Vec<u8>`
//! backed implementation suitable for CPU-side rendering.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Pixel layout of a bitmap
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// Single alpha channel, 1 byte per pixel
    Alpha8,
    /// 5-6-5 RGB without alpha, 2 bytes per pixel
    Rgb565,
    /// 4 bits per channel ARGB, 2 bytes per pixel
    Argb4444,
    /// 8 bits per channel ARGB, 4 bytes per pixel
    #[default]
    Argb8888,
    /// Half-float RGBA, 8 bytes per pixel
    RgbaF16,
    /// GPU resident storage, never mutable from the CPU side
    Hardware,
}

impl PixelFormat {
    /// Every known format, in declaration order
    pub const ALL: [PixelFormat; 6] = [
        PixelFormat::Alpha8,
        PixelFormat::Rgb565,
        PixelFormat::Argb4444,
        PixelFormat::Argb8888,
        PixelFormat::RgbaF16,
        PixelFormat::Hardware,
    ];

    /// Number of bytes a single pixel occupies
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Alpha8 => 1,
            PixelFormat::Rgb565 | PixelFormat::Argb4444 => 2,
            PixelFormat::Argb8888 | PixelFormat::Hardware => 4,
            PixelFormat::RgbaF16 => 8,
        }
    }

    /// Whether pixels in this format carry an alpha channel
    pub fn has_alpha(self) -> bool {
        !matches!(self, PixelFormat::Rgb565)
    }

    /// Formats whose buffers may be reused for a request in `self`,
    /// most preferred first
    ///
    /// The 32-bit and wide formats share a group because the consumer
    /// reconfigures to the exact target format afterwards. Narrow formats are
    /// never substituted for one another.
    pub fn compatible_formats(self) -> &'static [PixelFormat] {
        match self {
            PixelFormat::Argb8888 => &[PixelFormat::Argb8888, PixelFormat::RgbaF16],
            PixelFormat::RgbaF16 => &[PixelFormat::RgbaF16, PixelFormat::Argb8888],
            PixelFormat::Rgb565 => &[PixelFormat::Rgb565],
            PixelFormat::Argb4444 => &[PixelFormat::Argb4444],
            PixelFormat::Alpha8 => &[PixelFormat::Alpha8],
            PixelFormat::Hardware => &[PixelFormat::Hardware],
        }
    }
}

/// Dimensions and format describing a requested or existing bitmap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shape {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixel layout
    pub format: PixelFormat,
}

impl Shape {
    /// Create a new shape
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
        }
    }

    /// Bytes needed to hold a bitmap of this shape, computed without allocating
    pub fn byte_size(&self) -> usize {
        (self.width as usize)
            .saturating_mul(self.height as usize)
            .saturating_mul(self.format.bytes_per_pixel())
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} x {}], {:?}", self.width, self.height, self.format)
    }
}

/// Capability set the pool requires from a pooled buffer
///
/// A bitmap is owned by exactly one holder at a time: the caller while in use,
/// or the pool while available for reuse. Moving it into
/// [`LruBitmapPool::put`](crate::LruBitmapPool::put) transfers ownership.
pub trait Bitmap: Sized + Send + 'static {
    /// Whether [`reconfigure`](Bitmap::reconfigure) can reuse storage for a
    /// different shape. Drives automatic strategy selection.
    const SUPPORTS_RECONFIGURE: bool = true;

    /// Allocate a fresh bitmap of the given shape
    fn allocate(shape: Shape) -> Self;

    /// Current dimensions and format
    fn shape(&self) -> Shape;

    /// Current pixel format
    fn format(&self) -> PixelFormat {
        self.shape().format
    }

    /// Bytes backing this bitmap
    ///
    /// This is the allocation size, which can exceed `shape().byte_size()`
    /// after the bitmap was reconfigured to a smaller shape.
    fn byte_size(&self) -> usize;

    /// Whether the pixels can be written
    fn is_mutable(&self) -> bool;

    /// Whether [`recycle`](Bitmap::recycle) has already been called
    fn is_recycled(&self) -> bool;

    /// Change dimensions and format in place, keeping the storage when large enough
    fn reconfigure(&mut self, shape: Shape);

    /// Release the pixel storage
    fn recycle(&mut self);

    /// Clear every pixel to transparent
    fn erase(&mut self);

    /// Reset per-use flags so the next holder sees a freshly allocated bitmap
    fn reset_reuse_flags(&mut self);
}

/// A bitmap whose pixels live in a heap allocated `Vec<u8>`
#[derive(Debug, Clone)]
pub struct HeapBitmap {
    /// Backing storage; its length is the allocation size
    storage: Vec<u8>,
    shape: Shape,
    mutable: bool,
    recycled: bool,
    has_alpha: bool,
    premultiplied: bool,
}

impl HeapBitmap {
    /// Create a zeroed bitmap of the given shape
    pub fn new(shape: Shape) -> Self {
        Self {
            storage: vec![0u8; shape.byte_size()],
            shape,
            mutable: shape.format != PixelFormat::Hardware,
            recycled: false,
            has_alpha: shape.format.has_alpha(),
            premultiplied: true,
        }
    }

    /// Create a bitmap that rejects writes
    pub fn immutable(shape: Shape) -> Self {
        Self {
            mutable: false,
            ..Self::new(shape)
        }
    }

    /// Pixel bytes covered by the current shape
    pub fn pixels(&self) -> &[u8] {
        let len = self.shape.byte_size().min(self.storage.len());
        &self.storage[..len]
    }

    /// Mutable pixel bytes covered by the current shape
    ///
    /// Returns `None` for immutable or recycled bitmaps.
    pub fn pixels_mut(&mut self) -> Option<&mut [u8]> {
        if !self.mutable || self.recycled {
            return None;
        }
        let len = self.shape.byte_size().min(self.storage.len());
        Some(&mut self.storage[..len])
    }

    /// Whether the pixels are treated as carrying alpha
    pub fn has_alpha(&self) -> bool {
        self.has_alpha
    }

    /// Override the alpha flag
    pub fn set_has_alpha(&mut self, has_alpha: bool) {
        self.has_alpha = has_alpha;
    }

    /// Whether color channels are premultiplied by alpha
    pub fn is_premultiplied(&self) -> bool {
        self.premultiplied
    }

    /// Override the premultiplied flag
    pub fn set_premultiplied(&mut self, premultiplied: bool) {
        self.premultiplied = premultiplied;
    }
}

impl Bitmap for HeapBitmap {
    fn allocate(shape: Shape) -> Self {
        Self::new(shape)
    }

    fn shape(&self) -> Shape {
        self.shape
    }

    fn byte_size(&self) -> usize {
        self.storage.len()
    }

    fn is_mutable(&self) -> bool {
        self.mutable
    }

    fn is_recycled(&self) -> bool {
        self.recycled
    }

    fn reconfigure(&mut self, shape: Shape) {
        let needed = shape.byte_size();
        if needed > self.storage.len() {
            self.storage.resize(needed, 0);
        }
        self.shape = shape;
        self.has_alpha = shape.format.has_alpha();
    }

    fn recycle(&mut self) {
        self.storage = Vec::new();
        self.recycled = true;
    }

    fn erase(&mut self) {
        if let Some(pixels) = self.pixels_mut() {
            pixels.fill(0);
        }
    }

    fn reset_reuse_flags(&mut self) {
        self.has_alpha = true;
        self.premultiplied = true;
    }
}
