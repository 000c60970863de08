//! Rank fusion and the search orchestration built on it.

pub mod hybrid;
pub mod normalize;
pub mod ranker;

pub use hybrid::{
    FusedOutcome, MAX_FETCH, SearchHit, SearchMode, SearchOutcome, SearchRequest, SemanticLayer,
    fuse_search, search,
};
pub use ranker::{
    Candidate, FusionConfig, FusionError, FusionStrategy, HybridRanker, RankedCandidate,
    RankedResult,
};
