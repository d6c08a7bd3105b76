mod heap;
mod trace;

pub use heap::{Fresh, GcStats, Heap, HeapError, HeapSettings, RootProvider};
pub use trace::{block_words, traced_words};
