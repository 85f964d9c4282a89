mod process;

pub use process::{StreamerConfig, StreamerProcess};
