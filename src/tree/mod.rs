//! Binary Referral Tree
//!
//! Core tree algorithms over a `NodeStore`.
//!
//! ## Submodules
//! - **`placement`**: Resolves the true parent by walking one side's spine from the sponsor.
//! - **`propagation`**: Walks `parent_id` links to the root, bumping one counter per ancestor (`CountRule`).
//! - **`downline`**: Flattens the left and right subtrees of a participant into two lists.
//! - **`audit`**: Recounts subtrees and reports stale counters.
//! - **`types`**: Participant records, sides and member codes.
//! - **`error`**: Typed failures surfaced to callers.

pub mod audit;
pub mod downline;
pub mod error;
pub mod placement;
pub mod propagation;
pub mod types;

#[cfg(test)]
mod tests;
