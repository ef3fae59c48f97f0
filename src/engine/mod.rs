pub mod allocator;
pub mod compaction;
pub mod errors;
pub mod meta;
pub mod session;
pub mod types;

pub use errors::*;
