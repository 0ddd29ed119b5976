//! Journal posting: single journals, reversals and batches.

pub mod batch;
pub mod engine;
pub mod reversal;


pub use batch::{
    BatchFailure, BatchPolicy, BatchPoster, BatchResult, PostBatchCommand, RetryPolicy,
};
pub use engine::{PostJournalCommand, PostedJournal, PostingEngine};
pub use reversal::{ReverseJournalCommand, ReversedJournal, build_reversal};

pub(crate) use engine::Authorization;
