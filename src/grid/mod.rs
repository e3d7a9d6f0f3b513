pub mod global;
pub mod local;

pub use global::GlobalGrid;
pub use local::{DoubleBuffer, LocalBuffer};
