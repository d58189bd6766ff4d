/*!
 * # Authorization Gate
 *
 * Resolves the acting staff profile and answers the fixed capability questions the
 * pedido workflow asks before mutating anything. Every predicate takes the profile
 * explicitly; there is no ambient "current session".
 */

use sea_orm::EntityTrait;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::db::DbPool;
use crate::entities::user_profile::{self, UserRole};
use crate::errors::ServiceError;

/// Staff profile as seen by the rest of the crate.
pub type UserProfile = user_profile::Model;

impl UserRole {
    /// Roles allowed to approve, reject and delete pedidos.
    pub const APPROVERS: [UserRole; 2] = [UserRole::Compras, UserRole::Administrador];

    pub fn can_approve(self) -> bool {
        Self::APPROVERS.contains(&self)
    }

    pub fn can_create_purchase_order(self) -> bool {
        Self::APPROVERS.contains(&self)
    }

    pub fn can_manage_users(self) -> bool {
        self == UserRole::Administrador
    }
}

/// Inactive profiles hold no capability at all.
fn active(user: Option<&UserProfile>) -> Option<&UserProfile> {
    user.filter(|u| u.activo)
}

pub fn has_role(user: Option<&UserProfile>, roles: &[UserRole]) -> bool {
    active(user).map_or(false, |u| roles.contains(&u.role))
}

pub fn can_approve(user: Option<&UserProfile>) -> bool {
    active(user).map_or(false, |u| u.role.can_approve())
}

pub fn can_create_purchase_order(user: Option<&UserProfile>) -> bool {
    active(user).map_or(false, |u| u.role.can_create_purchase_order())
}

pub fn can_manage_users(user: Option<&UserProfile>) -> bool {
    active(user).map_or(false, |u| u.role.can_manage_users())
}

/// Server-side re-check used by the lifecycle engine before approve/reject/delete.
pub fn require_approver(user: &UserProfile, action: &str) -> Result<(), ServiceError> {
    if can_approve(Some(user)) {
        Ok(())
    } else {
        debug!(user_id = %user.id, role = %user.role, action, "approver capability denied");
        Err(ServiceError::Forbidden(format!(
            "Role {} cannot {} pedidos",
            user.role, action
        )))
    }
}

/// Looks up staff profiles in the identity store.
#[derive(Clone, Debug)]
pub struct AuthGate {
    db: Arc<DbPool>,
}

impl AuthGate {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Active profile with the given id, or `None` when unknown or deactivated.
    #[instrument(skip(self))]
    pub async fn current_user(&self, id: &str) -> Result<Option<UserProfile>, ServiceError> {
        let profile = user_profile::Entity::find_by_id(id.to_string())
            .one(&*self.db)
            .await?;

        Ok(profile.filter(|p| p.activo))
    }
}
