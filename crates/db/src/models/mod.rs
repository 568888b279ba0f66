//! Row structs, their [`Entity`](crate::entity::Entity) descriptions, and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A create DTO (validated with `validator`) for inserts
//! - An update DTO (all `Option` fields) for patches
//!
//! Both DTOs implement [`Fillable`](crate::values::Fillable).

pub mod audit_log;
pub mod document_type;
pub mod payment_status;
pub mod permission;
pub mod phone_area_code;
pub mod role;
pub mod user;
