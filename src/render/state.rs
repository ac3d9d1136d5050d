//! Viewport state management
//!
//! State changes go through [`ViewportState::apply`], which returns the
//! effects the controller must execute. The scale invariant lives here:
//! `final_scale = fit_scale * manual_zoom`, recomputed whenever the viewport,
//! the page, or the manual zoom changes.

use super::request::{RenderParams, ViewportSize};

/// Scroll direction for viewport panning
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
}

/// Current viewport state for an open document
#[derive(Clone, Debug)]
pub struct ViewportState {
    /// Viewport dimensions in pixels
    pub viewport: ViewportSize,

    /// User zoom factor on top of the fit scale
    pub manual_zoom: f32,

    /// Current page (1-based)
    pub current_page: usize,

    /// Total page count, 0 until the document is ready
    pub page_count: usize,

    /// Intrinsic (width, height) per page, index 0 = page 1
    pub page_sizes: Vec<(f32, f32)>,

    /// Vertical scroll offset in pixels within the rendered page
    pub scroll_offset: u32,
}

impl ViewportState {
    /// Minimum manual zoom factor
    pub const MIN_ZOOM: f32 = 0.5;
    /// Maximum manual zoom factor
    pub const MAX_ZOOM: f32 = 2.0;
    /// Zoom step per zoom-in/zoom-out
    pub const ZOOM_STEP: f32 = 0.2;
    /// Vertical scroll step in pixels
    pub const SCROLL_STEP: u32 = 48;

    #[must_use]
    pub fn new(viewport: ViewportSize) -> Self {
        Self {
            viewport,
            manual_zoom: 1.0,
            current_page: 1,
            page_count: 0,
            page_sizes: Vec::new(),
            scroll_offset: 0,
        }
    }

    /// Clamp a zoom factor to the valid range, handling NaN/Inf
    #[must_use]
    pub fn clamp_zoom(factor: f32) -> f32 {
        if !factor.is_finite() {
            1.0
        } else {
            factor.clamp(Self::MIN_ZOOM, Self::MAX_ZOOM)
        }
    }

    /// Intrinsic size of the current page, if known
    #[must_use]
    pub fn current_page_size(&self) -> Option<(f32, f32)> {
        self.page_sizes.get(self.current_page.checked_sub(1)?).copied()
    }

    /// Scale at which the current page exactly fits the viewport
    #[must_use]
    pub fn fit_scale(&self) -> f32 {
        let Some((page_w, page_h)) = self.current_page_size() else {
            return 1.0;
        };
        if self.viewport.is_empty() || page_w <= 0.0 || page_h <= 0.0 {
            return 1.0;
        }

        let fit_w = self.viewport.width as f32 / page_w;
        let fit_h = self.viewport.height as f32 / page_h;
        fit_w.min(fit_h)
    }

    /// The scale actually rendered at: `fit_scale * manual_zoom`
    #[must_use]
    pub fn final_scale(&self) -> f32 {
        self.fit_scale() * self.manual_zoom
    }

    /// Render parameters for the current state
    #[must_use]
    pub fn render_params(&self) -> RenderParams {
        RenderParams {
            page: self.current_page,
            scale: self.final_scale(),
            viewport: self.viewport,
        }
    }

    /// Apply a command and return resulting effects
    #[must_use]
    pub fn apply(&mut self, cmd: Command) -> Vec<Effect> {
        match cmd {
            Command::SetDocument {
                page_count,
                page_sizes,
            } => {
                self.page_count = page_count;
                self.page_sizes = page_sizes;
                if page_count > 0 {
                    self.current_page = self.current_page.clamp(1, page_count);
                }
                vec![Effect::RenderCurrentPage]
            }

            Command::SetViewport(size) => {
                if self.viewport != size {
                    self.viewport = size;
                    vec![Effect::InvalidateCache, Effect::RenderCurrentPage]
                } else {
                    vec![]
                }
            }

            Command::ZoomIn => self.set_zoom(self.manual_zoom + Self::ZOOM_STEP),

            Command::ZoomOut => self.set_zoom(self.manual_zoom - Self::ZOOM_STEP),

            Command::GoToPage(page) => {
                if self.page_count == 0 {
                    return vec![];
                }
                let clamped = page.clamp(1, self.page_count);
                if self.current_page != clamped {
                    self.current_page = clamped;
                    self.scroll_offset = 0;
                    vec![Effect::RenderCurrentPage]
                } else {
                    vec![]
                }
            }

            Command::Scroll(direction) => {
                self.scroll_offset = match direction {
                    ScrollDirection::Up => self.scroll_offset.saturating_sub(Self::SCROLL_STEP),
                    ScrollDirection::Down => self.scroll_offset.saturating_add(Self::SCROLL_STEP),
                };
                vec![]
            }
        }
    }

    fn set_zoom(&mut self, factor: f32) -> Vec<Effect> {
        let clamped = Self::clamp_zoom(factor);
        if (self.manual_zoom - clamped).abs() > f32::EPSILON {
            self.manual_zoom = clamped;
            vec![Effect::InvalidateCache, Effect::RenderCurrentPage]
        } else {
            vec![]
        }
    }
}

/// Commands that modify viewport state
#[derive(Clone, Debug)]
pub enum Command {
    /// Document metadata arrived from the worker
    SetDocument {
        page_count: usize,
        page_sizes: Vec<(f32, f32)>,
    },
    /// Set the viewport size (post-debounce)
    SetViewport(ViewportSize),
    /// Increase manual zoom by one step
    ZoomIn,
    /// Decrease manual zoom by one step
    ZoomOut,
    /// Go to a specific page (1-based, clamped)
    GoToPage(usize),
    /// Pan the viewport vertically
    Scroll(ScrollDirection),
}

/// Effects produced by state changes
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Drop all cached rasters
    InvalidateCache,
    /// Issue a render for the current page at the current scale
    RenderCurrentPage,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_state() -> ViewportState {
        let mut state = ViewportState::new(ViewportSize::new(1000, 1000));
        let _ = state.apply(Command::SetDocument {
            page_count: 20,
            page_sizes: vec![(500.0, 1000.0); 20],
        });
        state
    }

    #[test]
    fn fit_scale_uses_smaller_ratio() {
        let state = ready_state();
        // 1000/500 = 2.0 horizontally, 1000/1000 = 1.0 vertically
        assert_eq!(state.fit_scale(), 1.0);
    }

    #[test]
    fn final_scale_is_fit_times_zoom() {
        let mut state = ready_state();
        let _ = state.apply(Command::ZoomIn);
        let _ = state.apply(Command::ZoomIn);

        assert!((state.manual_zoom - 1.4).abs() < 1e-6);
        assert!((state.final_scale() - state.fit_scale() * state.manual_zoom).abs() < 1e-6);
    }

    #[test]
    fn zoom_clamps_at_bounds_and_is_idempotent_there() {
        let mut state = ready_state();

        for _ in 0..20 {
            let _ = state.apply(Command::ZoomIn);
        }
        assert_eq!(state.manual_zoom, ViewportState::MAX_ZOOM);
        assert!(state.apply(Command::ZoomIn).is_empty());

        for _ in 0..20 {
            let _ = state.apply(Command::ZoomOut);
        }
        assert_eq!(state.manual_zoom, ViewportState::MIN_ZOOM);
        assert!(state.apply(Command::ZoomOut).is_empty());
    }

    #[test]
    fn clamp_zoom_normalizes_non_finite() {
        assert_eq!(ViewportState::clamp_zoom(f32::NAN), 1.0);
        assert_eq!(ViewportState::clamp_zoom(f32::INFINITY), 1.0);
        assert_eq!(ViewportState::clamp_zoom(5.0), ViewportState::MAX_ZOOM);
        assert_eq!(ViewportState::clamp_zoom(0.0), ViewportState::MIN_ZOOM);
    }

    #[test]
    fn go_to_page_clamps_to_bounds() {
        let mut state = ready_state();

        let effects = state.apply(Command::GoToPage(999));
        assert_eq!(state.current_page, 20);
        assert_eq!(effects, vec![Effect::RenderCurrentPage]);

        let effects = state.apply(Command::GoToPage(0));
        assert_eq!(state.current_page, 1);
        assert_eq!(effects, vec![Effect::RenderCurrentPage]);
    }

    #[test]
    fn go_to_same_page_is_a_no_op() {
        let mut state = ready_state();
        let _ = state.apply(Command::GoToPage(5));
        assert!(state.apply(Command::GoToPage(5)).is_empty());
    }

    #[test]
    fn page_change_resets_scroll() {
        let mut state = ready_state();
        let _ = state.apply(Command::Scroll(ScrollDirection::Down));
        assert!(state.scroll_offset > 0);

        let _ = state.apply(Command::GoToPage(2));
        assert_eq!(state.scroll_offset, 0);
    }

    #[test]
    fn viewport_change_invalidates_and_rerenders() {
        let mut state = ready_state();

        let effects = state.apply(Command::SetViewport(ViewportSize::new(640, 480)));
        assert_eq!(
            effects,
            vec![Effect::InvalidateCache, Effect::RenderCurrentPage]
        );

        assert!(state
            .apply(Command::SetViewport(ViewportSize::new(640, 480)))
            .is_empty());
    }

    #[test]
    fn scroll_up_saturates_at_zero() {
        let mut state = ready_state();
        let _ = state.apply(Command::Scroll(ScrollDirection::Up));
        assert_eq!(state.scroll_offset, 0);
    }
}
