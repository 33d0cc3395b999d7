//! Data models for Coffer entities.
//!
//! This module contains the data structures the console consumes
//! through the typed endpoint wrappers:
//!
//! - `Contribution`, `Expense`, `Payout`: financial records
//! - `Member`: organization roster rows
//! - `ReportSummary`: aggregated totals for a reporting period
//!
//! These are plain wire shapes. No business rule about what a
//! contribution or expense means lives here.

pub mod finance;
pub mod member;

pub use finance::{Contribution, Expense, Payout, ReportSummary};
pub use member::{Member, MembersResponse, OrganizationInfo};
