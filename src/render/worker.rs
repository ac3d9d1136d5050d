//! Render worker - runs in a dedicated thread

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use flume::{Receiver, Sender};

use super::cache::{CacheKey, RasterCache};
use super::request::{RenderRequest, RenderResponse};
use crate::engine::{DocumentEngine, EngineDocument, EnginePage, RenderFault};

/// Main worker function. Opens the document from bytes, reports metadata,
/// then serves render requests until shutdown.
///
/// `latest` is the supersession watermark: any request whose generation is
/// below it is reported as canceled, both before rasterizing and again
/// before replying, so a stale render never produces a frame.
#[expect(
    clippy::needless_pass_by_value,
    reason = "Values moved into thread, need ownership"
)]
pub(crate) fn render_worker<E: DocumentEngine>(
    engine: E,
    bytes: Vec<u8>,
    requests: Receiver<RenderRequest>,
    responses: Sender<RenderResponse>,
    latest: Arc<AtomicU64>,
    cache: Arc<Mutex<RasterCache>>,
) {
    let doc = match engine.open(&bytes) {
        Ok(doc) => doc,
        Err(e) => {
            let _ = responses.send(RenderResponse::LoadFailed(e));
            return;
        }
    };

    let page_count = doc.page_count();
    let page_sizes = collect_page_sizes(&doc, page_count);
    let _ = responses.send(RenderResponse::DocumentReady {
        page_count,
        page_sizes,
    });

    for request in requests.iter() {
        match request {
            RenderRequest::Page { generation, params } => {
                if generation.0 < latest.load(Ordering::Acquire) {
                    let _ = responses.send(RenderResponse::Canceled(generation));
                    continue;
                }

                let key = CacheKey::from_params(&params);
                let cached = cache
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .get(&key);
                if let Some(raster) = cached {
                    let _ = responses.send(RenderResponse::Frame {
                        generation,
                        page: params.page,
                        scale: params.scale,
                        raster,
                    });
                    continue;
                }

                match rasterize(&doc, params.page, params.scale) {
                    Ok(raster) => {
                        let raster = cache
                            .lock()
                            .unwrap_or_else(std::sync::PoisonError::into_inner)
                            .insert(key, raster);

                        // Re-check after the (possibly long) render: a frame
                        // for a superseded request must never commit.
                        if generation.0 < latest.load(Ordering::Acquire) {
                            let _ = responses.send(RenderResponse::Canceled(generation));
                        } else {
                            let _ = responses.send(RenderResponse::Frame {
                                generation,
                                page: params.page,
                                scale: params.scale,
                                raster,
                            });
                        }
                    }
                    Err(fault) => {
                        let _ = responses.send(RenderResponse::Error { generation, fault });
                    }
                }
            }

            RenderRequest::Shutdown => break,
        }
    }
}

fn collect_page_sizes<D: EngineDocument>(doc: &D, page_count: usize) -> Vec<(f32, f32)> {
    (1..=page_count)
        .map(|page| {
            doc.page(page)
                .map(|p| p.size())
                .unwrap_or((0.0, 0.0))
        })
        .collect()
}

fn rasterize<D: EngineDocument>(
    doc: &D,
    page: usize,
    scale: f32,
) -> Result<crate::engine::Raster, RenderFault> {
    let page = doc
        .page(page)
        .map_err(|e| RenderFault::generic(e.to_string()))?;
    page.rasterize(scale)
}
