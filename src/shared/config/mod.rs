pub mod global;
pub mod model;

pub use global::CONFIG;
pub use model::{CompactionConfig, LoggingConfig, Settings, load_settings};
