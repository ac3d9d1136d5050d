//! Deterministic in-memory engine for tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{DocumentEngine, EngineDocument, EnginePage, LoadError, PageRangeError, Raster, RenderFault};

/// How a fake page paints its raster
#[derive(Clone, Copy, Debug)]
pub enum Paint {
    /// Every pixel gets the same RGBA value
    Uniform([u8; 4]),
    /// Alternating cells of two RGBA values, enough variance to never
    /// look blank
    Checker([u8; 4], [u8; 4]),
}

/// One page of a [`FakeEngine`] document
#[derive(Clone, Copy, Debug)]
pub struct FakePage {
    pub width: f32,
    pub height: f32,
    pub paint: Paint,
}

impl FakePage {
    #[must_use]
    pub fn white(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            paint: Paint::Uniform([0xFF, 0xFF, 0xFF, 0xFF]),
        }
    }

    #[must_use]
    pub fn textured(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            paint: Paint::Checker([0x10, 0x10, 0x10, 0xFF], [0xF0, 0xF0, 0xF0, 0xFF]),
        }
    }
}

/// In-memory engine that ignores document bytes and serves a fixed page set.
///
/// `render_delay` simulates slow rasterization so supersession behavior can
/// be observed; `renders` counts rasterize calls across all cloned handles.
#[derive(Clone)]
pub struct FakeEngine {
    pages: Vec<FakePage>,
    render_delay: Duration,
    renders: Arc<AtomicUsize>,
    fail_open: bool,
}

impl FakeEngine {
    #[must_use]
    pub fn new(pages: Vec<FakePage>) -> Self {
        Self {
            pages,
            render_delay: Duration::ZERO,
            renders: Arc::new(AtomicUsize::new(0)),
            fail_open: false,
        }
    }

    /// Uniform document: `count` textured pages of the same size
    #[must_use]
    pub fn textured_document(count: usize, width: f32, height: f32) -> Self {
        Self::new(vec![FakePage::textured(width, height); count])
    }

    #[must_use]
    pub fn with_render_delay(mut self, delay: Duration) -> Self {
        self.render_delay = delay;
        self
    }

    /// Engine that refuses to open anything
    #[must_use]
    pub fn broken() -> Self {
        let mut engine = Self::new(Vec::new());
        engine.fail_open = true;
        engine
    }

    /// Shared counter of completed rasterize calls
    #[must_use]
    pub fn render_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.renders)
    }
}

pub struct FakeDocument {
    pages: Vec<FakePage>,
    render_delay: Duration,
    renders: Arc<AtomicUsize>,
}

impl DocumentEngine for FakeEngine {
    type Doc = FakeDocument;

    fn open(&self, _bytes: &[u8]) -> Result<Self::Doc, LoadError> {
        if self.fail_open {
            return Err(LoadError::malformed("not a document"));
        }
        if self.pages.is_empty() {
            return Err(LoadError::Empty);
        }
        Ok(FakeDocument {
            pages: self.pages.clone(),
            render_delay: self.render_delay,
            renders: Arc::clone(&self.renders),
        })
    }
}

impl EngineDocument for FakeDocument {
    type Page = FakeRenderablePage;

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page(&self, page: usize) -> Result<Self::Page, PageRangeError> {
        if page == 0 || page > self.pages.len() {
            return Err(PageRangeError {
                page,
                page_count: self.pages.len(),
            });
        }
        Ok(FakeRenderablePage {
            page: self.pages[page - 1],
            render_delay: self.render_delay,
            renders: Arc::clone(&self.renders),
        })
    }
}

pub struct FakeRenderablePage {
    page: FakePage,
    render_delay: Duration,
    renders: Arc<AtomicUsize>,
}

impl EnginePage for FakeRenderablePage {
    fn size(&self) -> (f32, f32) {
        (self.page.width, self.page.height)
    }

    fn rasterize(&self, scale: f32) -> Result<Raster, RenderFault> {
        if !self.render_delay.is_zero() {
            std::thread::sleep(self.render_delay);
        }

        let width = ((self.page.width * scale).round() as u32).max(1);
        let height = ((self.page.height * scale).round() as u32).max(1);

        let raster = match self.page.paint {
            Paint::Uniform(rgba) => Raster::filled(width, height, rgba),
            Paint::Checker(a, b) => {
                let mut raster = Raster::new(width, height);
                for y in 0..height {
                    for x in 0..width {
                        let rgba = if (x / 4 + y / 4) % 2 == 0 { a } else { b };
                        let at = ((y * width + x) * 4) as usize;
                        raster.pixels[at..at + 4].copy_from_slice(&rgba);
                    }
                }
                raster
            }
        };

        self.renders.fetch_add(1, Ordering::SeqCst);
        Ok(raster)
    }
}
