//! Result types shared by adapters, the cache and callers.

mod models;
mod timestamp;

pub use models::{
    count_words, quality_from_word_count, FetchResult, SearchResponse, SearchResult,
    FULL_QUALITY_WORD_COUNT,
};
pub use timestamp::UtcDateTime;
