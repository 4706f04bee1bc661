//! Line-oriented logging of the supervised process's output streams.

mod adapter;
mod sink;

pub use adapter::*;
pub use sink::*;
