pub mod detector;
pub mod scheduler;

pub use detector::{SpikeDetection, SpikeDetectionReport, SpikeDetector, SpikeSeverity};
pub use scheduler::{spawn_detection_task, spawn_purge_task};
