//! Core chain entities shared across the digest workspace.
//!
//! Everything here arrives from the consensus/execution engine already
//! finalized: block manifests, operation records with their result tree, and
//! the height-versioned states produced by operation execution. The digest is
//! a pure consumer and never re-validates any of it.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod entities;
pub mod errors;

pub use entities::{
    is_valid_address, Address, BlockManifest, CredentialRef, Hash, Height, OperationFact,
    OperationRecord, OperationResultNode, OperationResultSet, ProposalInfo, State, StateKey,
};
pub use errors::EntityError;
