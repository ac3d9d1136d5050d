//! Document engine abstraction
//!
//! The render pipeline is engine-agnostic: it only needs to open a document
//! from raw bytes, ask for page count and intrinsic page sizes, and rasterize
//! a page at a scale. The MuPDF-backed implementation lives behind the `pdf`
//! feature; tests use the deterministic in-memory engine from [`testing`].

#[cfg(feature = "pdf")]
mod mupdf_engine;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

#[cfg(feature = "pdf")]
pub use mupdf_engine::MupdfEngine;

/// Errors opening a document from raw bytes
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("document data is malformed: {detail}")]
    Malformed { detail: String },

    #[error("document has no pages")]
    Empty,
}

impl LoadError {
    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::Malformed {
            detail: detail.into(),
        }
    }
}

/// Requested page outside `[1, page_count]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("page {page} outside valid range 1..={page_count}")]
pub struct PageRangeError {
    pub page: usize,
    pub page_count: usize,
}

/// Errors produced while rasterizing a page
#[derive(Debug, thiserror::Error)]
pub enum RenderFault {
    #[cfg(feature = "pdf")]
    #[error("PDF engine: {0}")]
    Engine(#[from] mupdf::error::Error),

    #[error("{detail}")]
    Generic { detail: String },
}

impl RenderFault {
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic { detail: msg.into() }
    }
}

/// Rendered page raster, always RGBA8
#[derive(Clone, PartialEq, Eq)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    /// 4 bytes per pixel: R, G, B, A
    pub pixels: Vec<u8>,
}

impl Raster {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; (width as usize) * (height as usize) * 4],
        }
    }

    #[must_use]
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut pixels = Vec::with_capacity((width as usize) * (height as usize) * 4);
        for _ in 0..(width as usize) * (height as usize) {
            pixels.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    #[must_use]
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }
}

impl std::fmt::Debug for Raster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Raster")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// A parsing/rendering backend that can open documents from raw bytes
pub trait DocumentEngine: Send + 'static {
    type Doc: EngineDocument;

    fn open(&self, bytes: &[u8]) -> Result<Self::Doc, LoadError>;
}

/// An open document owned by the engine for the lifetime of one book
pub trait EngineDocument {
    type Page: EnginePage;

    fn page_count(&self) -> usize;

    /// Get a page handle. Pages are 1-based.
    fn page(&self, page: usize) -> Result<Self::Page, PageRangeError>;
}

/// A single page, ready to report its intrinsic size and rasterize
pub trait EnginePage {
    /// Intrinsic page size in engine units (typically PDF points)
    fn size(&self) -> (f32, f32);

    fn rasterize(&self, scale: f32) -> Result<Raster, RenderFault>;
}
