//! MuPDF-backed document engine

use mupdf::{Colorspace, Document, Matrix, Page, Pixmap};

use super::{DocumentEngine, EngineDocument, EnginePage, LoadError, PageRangeError, Raster, RenderFault};

/// Engine backed by the MuPDF library
#[derive(Debug, Default, Clone, Copy)]
pub struct MupdfEngine;

impl MupdfEngine {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

pub struct MupdfDocument {
    doc: Document,
    page_count: usize,
}

pub struct MupdfPage {
    page: Page,
    width: f32,
    height: f32,
}

impl DocumentEngine for MupdfEngine {
    type Doc = MupdfDocument;

    fn open(&self, bytes: &[u8]) -> Result<Self::Doc, LoadError> {
        let doc = Document::from_bytes(bytes, "application/pdf")
            .map_err(|e| LoadError::malformed(e.to_string()))?;
        let page_count = doc
            .page_count()
            .map_err(|e| LoadError::malformed(e.to_string()))? as usize;

        if page_count == 0 {
            return Err(LoadError::Empty);
        }

        Ok(MupdfDocument { doc, page_count })
    }
}

impl EngineDocument for MupdfDocument {
    type Page = MupdfPage;

    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page(&self, page: usize) -> Result<Self::Page, PageRangeError> {
        if page == 0 || page > self.page_count {
            return Err(PageRangeError {
                page,
                page_count: self.page_count,
            });
        }

        // Engine pages are 0-indexed
        let loaded = self.doc.load_page(page as i32 - 1).map_err(|_| PageRangeError {
            page,
            page_count: self.page_count,
        })?;
        let bounds = loaded.bounds().map_err(|_| PageRangeError {
            page,
            page_count: self.page_count,
        })?;

        Ok(MupdfPage {
            page: loaded,
            width: bounds.x1 - bounds.x0,
            height: bounds.y1 - bounds.y0,
        })
    }
}

impl EnginePage for MupdfPage {
    fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    fn rasterize(&self, scale: f32) -> Result<Raster, RenderFault> {
        let transform = Matrix::new_scale(scale, scale);
        let rgb = Colorspace::device_rgb();
        let pixmap = self.page.to_pixmap(&transform, &rgb, true, false)?;
        pixmap_to_rgba(&pixmap)
    }
}

fn pixmap_to_rgba(pixmap: &Pixmap) -> Result<Raster, RenderFault> {
    let n = pixmap.n() as usize;
    if n < 3 {
        return Err(RenderFault::generic(format!(
            "Unsupported pixmap format: {n} channels"
        )));
    }

    let width = pixmap.width() as usize;
    let height = pixmap.height() as usize;
    let stride = pixmap.stride() as usize;
    let samples = pixmap.samples();
    let row_bytes = width * n;
    let expected_min = stride.saturating_mul(height);
    if samples.len() < expected_min || row_bytes > stride {
        return Err(RenderFault::generic("Pixmap buffer size mismatch"));
    }

    let mut pixels = Vec::with_capacity(width * height * 4);
    for y in 0..height {
        let row_start = y * stride;
        let row = &samples[row_start..row_start + row_bytes];
        for px in row.chunks_exact(n) {
            pixels.extend_from_slice(&px[..3]);
            pixels.push(if n >= 4 { px[3] } else { 0xFF });
        }
    }

    Ok(Raster {
        width: pixmap.width(),
        height: pixmap.height(),
        pixels,
    })
}
