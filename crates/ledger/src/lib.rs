#![forbid(unsafe_code)]

//! Sharing and quota rules on top of `sharekeep-storage`.
//!
//! [`SharingService`] holds the invite ledger and the access grant manager;
//! every membership change it makes is a single [`sharekeep_storage::WriteBatch`]
//! touching both the space and the member's reverse index. [`QuotaLedger`]
//! keeps the per-user byte counters that object-store events drive.

mod access;
mod error;
mod invite_code;
mod invites;
mod membership;
mod quota;
mod sharing;

#[cfg(test)]
mod test_support;

pub use error::LedgerError;
pub use invite_code::{InviteCodes, RandomInviteCodes};
pub use invites::{AcceptOutcome, MAX_CODE_ATTEMPTS};
pub use quota::{EventOutcome, QuotaLedger};
pub use sharing::SharingService;
