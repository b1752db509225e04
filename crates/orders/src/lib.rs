//! Orders domain module.
//!
//! Orders are owned resources: every row records the principal that created it
//! and is only ever visible to that principal. This crate holds the pure
//! validation rules (no IO, no HTTP, no storage).

pub mod order;

pub use order::{MAX_ITEM_LEN, MAX_PRICE, NewOrder, Order, OrderPatch};
