pub mod branch;
pub mod grant;
pub mod member;
pub mod permission;
pub mod role;
pub mod warrant;

pub use branch::Branch;
pub use grant::{GrantSource, MemberRoleGrant};
pub use member::Member;
pub use permission::{Permission, ScopingRule};
pub use role::{Role, RolePermission};
pub use warrant::{RosterState, Warrant, WarrantRoster, WarrantRosterApproval, WarrantState};
