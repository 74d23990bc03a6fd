//! Integration tests for the accumulation engine
//!
//! Tests are organized by topic:
//! - `accumulators` - Update, merge and statistics of single metrics
//! - `collections` - Result collections: insertion, rep-wise merge, queries
//! - `combine` - Union of collections over different parameter values
//! - `records` - Dictionary form round trips
//! - `reduce` - Reduction of worker partials
//! - `properties` - Merge algebra checked with proptest

mod reduce;
