//! Narration: turning transcript text into queued, spoken utterances.
//!
//! - `normalizer`: reply text → spoken Japanese, as an ordered list of rules
//! - `thinking`: the lighter pass used for thinking blocks
//! - `chunker`: splits long narration at paragraph/sentence/clause marks
//! - `queue`: FIFO queue and the single playback worker draining it

pub mod chunker;
pub mod normalizer;
pub mod queue;
pub mod thinking;

pub use normalizer::normalize_text;
pub use queue::{NarrationItem, NarrationQueue, NarrationSink};
pub use thinking::normalize_thinking;
