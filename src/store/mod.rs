//! In-memory rate cache: the quote table, its owning actor and the public handle

pub mod actor;
pub mod engine;
pub mod handle;
pub mod state;

pub use engine::{Conversion, ConversionSource};
pub use handle::RateCache;
pub use state::{RateStore, Snapshot};
