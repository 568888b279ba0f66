//! Named repositories.
//!
//! Every table gets the generic [`Repo`] operations through an alias; the
//! few queries that do not fit the generic shape live in `impl Repo<T>`
//! blocks in the submodules.

use crate::models::audit_log::AuditLog;
use crate::models::document_type::DocumentType;
use crate::models::payment_status::PaymentStatus;
use crate::models::permission::Permission;
use crate::models::phone_area_code::PhoneAreaCode;
use crate::models::role::Role;
use crate::models::user::User;
use crate::repository::Repo;

pub mod role_repo;
pub mod user_repo;

pub type AuditLogRepo = Repo<AuditLog>;
pub type DocumentTypeRepo = Repo<DocumentType>;
pub type PaymentStatusRepo = Repo<PaymentStatus>;
pub type PermissionRepo = Repo<Permission>;
pub type PhoneAreaCodeRepo = Repo<PhoneAreaCode>;
pub type RoleRepo = Repo<Role>;
pub type UserRepo = Repo<User>;
