pub mod icons;
pub mod phase_progress;

pub use phase_progress::{PhaseProgress, status_label};
