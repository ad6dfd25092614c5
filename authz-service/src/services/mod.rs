pub mod authz;
pub mod database;
pub mod nested_set;

pub use authz::{AccessDecision, BranchBounds, GrantContext, MemberAuthContext};
pub use database::Database;
