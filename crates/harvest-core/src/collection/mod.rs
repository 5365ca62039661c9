//! Per-entity image directories.
//!
//! This module provides:
//! - Quota arithmetic and the quota audit
//! - Sequential filename allocation
//! - Trimming of over-quota directories

pub mod naming;
mod prune;
mod quota;

pub use naming::{extension_for_content_type, next_filename};
pub use prune::delete_excess;
pub use quota::{adjust, audit_quotas, count_files, remaining, QuotaDecision, QuotaShortfall};
