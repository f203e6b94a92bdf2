//! Rule selection by dotted-segment glob patterns.
//!
//! - [`PatternTrie`]: segment-keyed tree of patterns with parallel
//!   literal/wildcard lookup
//! - [`Filter`]: copy-on-write publication of a trie for lock-free readers

pub mod filter;
pub mod trie;

pub use filter::Filter;
pub use trie::PatternTrie;
