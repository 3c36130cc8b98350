//! Binary Referral Tree Library
//!
//! Each participant has at most one left and one right child. New registrants
//! are placed by walking down from their sponsor until an empty slot is found,
//! and every ancestor keeps a running count of its left and right subtrees.
//!
//! ## Modules
//! - **`storage`**: The `NodeStore` contract and its in-memory implementation.
//! - **`tree`**: Placement walk, count propagation, downline reports and count audits.
//! - **`registration`**: The registration saga and the HTTP API around it.
//! - **`config`**: Command line / environment configuration for the server binary.

pub mod config;
pub mod registration;
pub mod storage;
pub mod tree;
