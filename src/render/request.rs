//! Render request and response types

use std::sync::Arc;

use crate::engine::{LoadError, Raster, RenderFault};

/// Monotonically increasing id tagging each render request.
///
/// A request whose generation is below the controller's latest watermark is
/// superseded: the worker reports it as canceled and never produces pixels
/// for it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(pub u64);

impl Generation {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Viewport dimensions in pixels
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

impl ViewportSize {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Parameters for rendering one page
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderParams {
    /// Page number (1-based)
    pub page: usize,
    /// Final scale (fit scale times manual zoom)
    pub scale: f32,
    /// Viewport the scale was computed for
    pub viewport: ViewportSize,
}

/// Request sent to the render worker
#[derive(Debug)]
pub enum RenderRequest {
    Page {
        generation: Generation,
        params: RenderParams,
    },

    /// Shut the worker down. Safe to send more than once.
    Shutdown,
}

/// Response from the render worker
#[derive(Debug)]
pub enum RenderResponse {
    /// Document opened; sent once before any frame
    DocumentReady {
        page_count: usize,
        /// Intrinsic (width, height) per page, index 0 = page 1
        page_sizes: Vec<(f32, f32)>,
    },

    /// Rendered frame for a page
    Frame {
        generation: Generation,
        page: usize,
        scale: f32,
        raster: Arc<Raster>,
    },

    /// Request was superseded before it could commit. Not an error.
    Canceled(Generation),

    /// Rasterization failed
    Error {
        generation: Generation,
        fault: RenderFault,
    },

    /// The document bytes could not be opened
    LoadFailed(LoadError),
}
