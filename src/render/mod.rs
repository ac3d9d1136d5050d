//! Page rendering infrastructure

mod cache;
mod controller;
mod debounce;
mod request;
mod state;
mod surface;
mod worker;

pub use cache::{CacheKey, RasterCache};
pub use controller::{RenderController, RenderEvent, DEFAULT_CACHE_PAGES, RESIZE_DEBOUNCE};
pub use debounce::Debouncer;
pub use request::{Generation, RenderParams, RenderRequest, RenderResponse, ViewportSize};
pub use state::{Command, Effect, ScrollDirection, ViewportState};
pub use surface::Surface;
