use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

/// Closed set of roles a profile can hold. Stored and serialized by their shop-floor labels.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum UserRole {
    /// Purchasing
    #[sea_orm(string_value = "Compras")]
    #[serde(rename = "Compras")]
    #[strum(serialize = "Compras")]
    Compras,
    /// Graphics shop
    #[sea_orm(string_value = "Taller Gráfico")]
    #[serde(rename = "Taller Gráfico")]
    #[strum(serialize = "Taller Gráfico")]
    TallerGrafico,
    /// Metalwork
    #[sea_orm(string_value = "Metalúrgica")]
    #[serde(rename = "Metalúrgica")]
    #[strum(serialize = "Metalúrgica")]
    Metalurgica,
    /// Counter
    #[sea_orm(string_value = "Mostrador")]
    #[serde(rename = "Mostrador")]
    #[strum(serialize = "Mostrador")]
    Mostrador,
    #[sea_orm(string_value = "Administrador")]
    #[serde(rename = "Administrador")]
    #[strum(serialize = "Administrador")]
    Administrador,
}

/// Staff profile. Owned by the identity provider; this crate only reads it.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_profiles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub email: String,
    pub nombre: String,
    pub role: UserRole,
    pub activo: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr> {
        let mut active_model = self;
        let now = Utc::now();
        if insert && active_model.created_at.is_not_set() {
            active_model.created_at = Set(now);
        }
        active_model.updated_at = Set(now);
        Ok(active_model)
    }
}
