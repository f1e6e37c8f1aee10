//! Onboarding Types - Core records for the supplier onboarding daemon
//!
//! A supplier moves through a small state graph while the daemon provisions
//! a private messaging channel, resolves the contact's membership and
//! dispatches a commission contract for e-signature.
//!
//! ## Key Concepts
//!
//! - **SupplierRecord**: The onboarding subject, persisted by the daemon
//! - **StateCode**: Where the record is in the onboarding graph
//! - **ContractStatus**: Progress of the e-signature dispatch
//! - **ContractTemplate**: Flat-rate or tiered commission scheme
//!
//! This crate performs no I/O.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod contract;
pub mod ids;
pub mod supplier;

pub use contract::{
    commission, settlement_summary, ContractTemplate, ContractValidationError, SettlementSummary,
};
pub use ids::{ChannelRef, DocumentRef, SupplierId, UserRef};
pub use supplier::{
    ChannelAlreadyAssigned, ContractStatus, ContractStatusError, IllegalTransition, StateCode,
    SupplierCredentials, SupplierRecord, UnknownCode,
};
