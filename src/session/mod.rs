//! Reading-session tracking

mod progress;
mod tracker;

pub use progress::{ProgressTotals, ProgressUpdate};
pub use tracker::{
    SessionEffect, SessionSnapshot, SessionStatus, SessionTracker, SessionTrigger,
    ACTIVITY_DEBOUNCE, INACTIVITY_TIMEOUT,
};
