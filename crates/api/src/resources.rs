//! Per-entity wiring for the generic resource handlers.
//!
//! Read-only endpoints work for any [`Entity`]; its table name doubles as the
//! permission prefix (`document_types.view`). Writable resources additionally
//! implement [`WriteResource`], which names the request bodies, turns them
//! into insert/patch rows, and enforces domain guards.

use backoffice_core::error::CoreError;
use backoffice_core::roles::ROLE_ADMIN;
use backoffice_core::types::DbId;
use backoffice_db::entity::Entity;
use backoffice_db::models::document_type::{CreateDocumentType, DocumentType, UpdateDocumentType};
use backoffice_db::models::payment_status::{
    CreatePaymentStatus, PaymentStatus, UpdatePaymentStatus,
};
use backoffice_db::models::phone_area_code::{
    CreatePhoneAreaCode, PhoneAreaCode, UpdatePhoneAreaCode,
};
use backoffice_db::models::role::{CreateRole, Role, UpdateRole};
use backoffice_db::models::user::{CreateUser, UpdateUser, User};
use backoffice_db::values::Fillable;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use validator::Validate;

use crate::auth::password::{hash_password, validate_password_strength, MIN_PASSWORD_LENGTH};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;

/// Mutations that can be vetoed by [`WriteResource::guard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guarded {
    Rename,
    Delete,
    ForceDelete,
    Deactivate,
}

impl Guarded {
    fn verb(self) -> &'static str {
        match self {
            Guarded::Rename => "renamed",
            Guarded::Delete | Guarded::ForceDelete => "deleted",
            Guarded::Deactivate => "deactivated",
        }
    }
}

/// An entity that can be created and modified over HTTP.
pub trait WriteResource: Entity {
    /// `POST` body.
    type Create: DeserializeOwned + Validate + Send + 'static;
    /// `PUT` body, without the optimistic-lock token.
    type Update: DeserializeOwned + Validate + Send + 'static;
    type CreateRow: Fillable + Send + Sync;
    type UpdateRow: Fillable + Send + Sync;

    fn create_row(input: Self::Create) -> AppResult<Self::CreateRow>;

    fn update_row(input: Self::Update) -> AppResult<Self::UpdateRow>;

    /// Veto `action` on `entity` by `actor`. Runs before the write, for
    /// single-row and bulk requests alike.
    fn guard(_action: Guarded, _actor: &AuthUser, _entity: &Self) -> Result<(), CoreError> {
        Ok(())
    }

    /// Veto a `PUT` by the guarded changes it carries.
    fn guard_update(
        _actor: &AuthUser,
        _entity: &Self,
        _changes: &Self::Update,
    ) -> Result<(), CoreError> {
        Ok(())
    }
}

/// `Some(false)` is a deactivation; `None` and `Some(true)` are not.
fn deactivates(is_active: Option<bool>) -> bool {
    is_active == Some(false)
}

/// Catalogs whose request bodies are their DTOs.
macro_rules! plain_resource {
    ($entity:ty, $create:ty, $update:ty) => {
        impl WriteResource for $entity {
            type Create = $create;
            type Update = $update;
            type CreateRow = $create;
            type UpdateRow = $update;

            fn create_row(input: $create) -> AppResult<$create> {
                Ok(input)
            }

            fn update_row(input: $update) -> AppResult<$update> {
                Ok(input)
            }
        }
    };
}

plain_resource!(DocumentType, CreateDocumentType, UpdateDocumentType);
plain_resource!(PaymentStatus, CreatePaymentStatus, UpdatePaymentStatus);
plain_resource!(PhoneAreaCode, CreatePhoneAreaCode, UpdatePhoneAreaCode);

impl WriteResource for Role {
    type Create = CreateRole;
    type Update = UpdateRole;
    type CreateRow = CreateRole;
    type UpdateRow = UpdateRole;

    fn create_row(input: CreateRole) -> AppResult<CreateRole> {
        Ok(input)
    }

    fn update_row(input: UpdateRole) -> AppResult<UpdateRole> {
        Ok(input)
    }

    /// The `admin` role can be described but never renamed, removed or
    /// switched off.
    fn guard(action: Guarded, _actor: &AuthUser, role: &Role) -> Result<(), CoreError> {
        if role.name == ROLE_ADMIN {
            return Err(CoreError::Domain(format!(
                "The {ROLE_ADMIN} role cannot be {}",
                action.verb()
            )));
        }
        Ok(())
    }

    fn guard_update(actor: &AuthUser, role: &Role, changes: &UpdateRole) -> Result<(), CoreError> {
        if changes.name.as_deref().is_some_and(|name| name != role.name) {
            Self::guard(Guarded::Rename, actor, role)?;
        }
        if deactivates(changes.is_active) {
            Self::guard(Guarded::Deactivate, actor, role)?;
        }
        Ok(())
    }
}

/// `POST /users` body. The password is hashed before it reaches the database.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email, length(max = 255))]
    pub email: String,
    pub password: String,
    pub role_id: DbId,
    pub is_active: Option<bool>,
}

/// `PUT /users/{id}` body. A present `password` replaces the current one.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(email, length(max = 255))]
    pub email: Option<String>,
    pub password: Option<String>,
    pub role_id: Option<DbId>,
    pub is_active: Option<bool>,
}

impl WriteResource for User {
    type Create = CreateUserRequest;
    type Update = UpdateUserRequest;
    type CreateRow = CreateUser;
    type UpdateRow = UpdateUser;

    fn create_row(input: CreateUserRequest) -> AppResult<CreateUser> {
        Ok(CreateUser {
            name: input.name,
            email: input.email,
            password_hash: hashed(&input.password)?,
            role_id: input.role_id,
            is_active: input.is_active.unwrap_or(true),
        })
    }

    fn update_row(input: UpdateUserRequest) -> AppResult<UpdateUser> {
        let password_hash = input.password.as_deref().map(hashed).transpose()?;
        Ok(UpdateUser {
            name: input.name,
            email: input.email,
            password_hash,
            role_id: input.role_id,
            is_active: input.is_active,
        })
    }

    /// Nobody deletes or deactivates their own account.
    fn guard(action: Guarded, actor: &AuthUser, user: &User) -> Result<(), CoreError> {
        if user.id == actor.user_id && action != Guarded::Rename {
            return Err(CoreError::Domain(format!(
                "Your own account cannot be {}",
                action.verb()
            )));
        }
        Ok(())
    }

    fn guard_update(
        actor: &AuthUser,
        user: &User,
        changes: &UpdateUserRequest,
    ) -> Result<(), CoreError> {
        if deactivates(changes.is_active) {
            Self::guard(Guarded::Deactivate, actor, user)?;
        }
        Ok(())
    }
}

fn hashed(password: &str) -> AppResult<String> {
    validate_password_strength(password, MIN_PASSWORD_LENGTH)
        .map_err(|msg| AppError::Core(CoreError::Validation(msg)))?;
    hash_password(password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))
}
