//! # Convoy range sets
//!
//! A [`RangeSet`] is a finite set of non-negative integers stored as a
//! minimal ascending sequence of disjoint, non-adjacent closed intervals.
//! It is the vocabulary every Convoy range query is expressed in: the set of
//! committed repository versions, the set of event IDs present in an audit
//! log, and the ranges requested over the wire.
//!
//! The string form (`lo-hi,lo-hi,...`, ascending, no spaces, empty set =
//! empty string) crosses the network, so parsing is strict: input that is
//! not already normalized is rejected rather than silently repaired.

mod error;
mod set;

pub use error::{RangeError, RangeResult};
pub use set::{RangeIter, RangeSet};
