//! Registration Service Module
//!
//! Bridges the HTTP API with the tree algorithms.
//!
//! ## Submodules
//! - **`service`**: `ReferralService`, the insertion saga plus profile/downline/audit reads.
//! - **`handlers`**: Axum request handlers and error-to-status mapping.
//! - **`protocol`**: Endpoints and JSON DTOs.
//! - **`credentials`**: Credential hashing seam (`CredentialHasher`).

pub mod credentials;
pub mod handlers;
pub mod protocol;
pub mod service;
