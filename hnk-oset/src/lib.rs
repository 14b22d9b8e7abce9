//! Sorted multiset containers binned by an integer "depth" label, used to
//! track candidate tree nodes for reversible-jump proposal bookkeeping.

pub mod error;
pub mod keyset;
pub mod keyvalueset;

pub use error::{OsetError, OsetResult};
pub use keyset::KeySet;
pub use keyvalueset::{InsertAction, KeyValueSet};
