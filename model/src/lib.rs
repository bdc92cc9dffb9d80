//! Domain records for the Airshow admin backend.
//!
//! These are the shapes the rest of the workspace passes around: the
//! managed resources (channels, programs, users), the role/permission
//! records the authorization engine consumes, and the [`Subject`] trait
//! that lets the engine look up instance attributes by field name.

pub mod permission;
pub mod resource;
pub mod subject;

pub use permission::{ActingUser, PermissionRecord, Role};
pub use resource::{Channel, Program, User};
pub use subject::Subject;
