//! Target matching for the streaming policy decision point.
//!
//! Documents are compiled to a normalized disjunctive form of opaque
//! [`Bool`](pdp_eval::Bool) literals. Two [`DocumentIndex`] strategies answer
//! which documents apply to a request: [`SimpleIndex`] evaluates every
//! target on its own, [`ImprovedIndex`] shares one [`Predicate`] per distinct
//! literal and eliminates conjunctions through bit-vectors. Both evaluate
//! targets with three-valued logic and return identical results.
//!
//! Snapshots are copy-on-write: mutations build a new snapshot and swap it
//! in, so a retrieval never sees a half-applied document set.

#![warn(missing_docs, clippy::pedantic)]

mod bitmask;
mod document;
mod error;
mod formula;
mod improved;
mod index;
mod predicate;
mod prp;
mod result;
mod simple;
mod store;

pub use bitmask::Bitmask;
pub use document::PolicyDocument;
pub use error::{IndexError, IndexResult};
pub use formula::{Conjunction, DisjunctiveFormula, Literal, TargetExpr};
pub use improved::ImprovedIndex;
pub use index::{DocumentIndex, IndexMode, IndexType};
pub use predicate::{Predicate, TriState};
pub use prp::{DocumentUpdate, PolicyRetrievalPoint};
pub use result::{BoundRetrieval, RetrievalResult};
pub use simple::SimpleIndex;
