//! Node Store Module
//!
//! Keyed persistence for participant records.
//!
//! ## Core Concepts
//! - **Contract**: `NodeStore` is the only thing the tree algorithms depend on
//!   (get, get-by-index, count, insert, update, claim/release slot).
//! - **Atomic slot claim**: linking a child is a compare-and-set, so a slot can
//!   never end up holding two different children.
//! - **Memory backend**: `MemoryNodeStore` keeps records in a `DashMap` with a
//!   unique email index.

pub mod memory;
pub mod store;
