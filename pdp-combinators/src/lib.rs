//! Combination of continuously updating policy decisions.
//!
//! A [`DocumentCombinator`] evaluates every document matched by a retrieval
//! and merges their decision streams with [`CombineLatest`]: once every
//! document has decided, each new decision triggers one recombination
//! under the configured [`CombiningAlgorithm`]. A [`PolicySet`] applies the
//! same matching and combination to policies nested inside one document.

#![warn(missing_docs, clippy::pedantic)]

mod algorithm;
mod combinator;
mod combine_latest;
mod error;
mod obligations;
mod policy_set;

pub use algorithm::CombiningAlgorithm;
pub use combinator::DocumentCombinator;
pub use combine_latest::{CombineLatest, Phase};
pub use error::CombinatorError;
pub use obligations::ObligationAdviceCollector;
pub use policy_set::PolicySet;
