//! HTTP handlers for authz-service.

pub mod authz;
pub mod branch;
pub mod grant;
pub mod member;
pub mod permission;
pub mod role;
pub mod warrant;
