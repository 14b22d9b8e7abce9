//! Memoised combinatorial counting engine for generalised-tree archetypes,
//! as consumed by reversible-jump MCMC proposal kernels.
//!
//! An [`archetype::Archetype`] describes a recursive tree shape (n identical
//! children, or an explicit heterogeneous list); [`archetype::ArchetypeNode::count`]
//! returns the number of distinct size-`k` arrangements embeddable at a
//! given height, memoising through the kernels in [`kernels`]. [`persistence`]
//! snapshots and reloads a graph's memo state.

pub mod archetype;
pub mod error;
pub mod kernels;
pub mod persistence;

pub use archetype::{Archetype, ArchetypeNode, Policy};
pub use error::{HnkError, HnkResult};
pub use persistence::{restore, save};

pub use hnk_bignum::Count;
pub use hnk_oset::{InsertAction, KeySet, KeyValueSet, OsetError, OsetResult};
