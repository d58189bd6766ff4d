use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

/// Marker that opens the system comment written on approval.
pub const APPROVED_MARKER: &str = "✅";
/// Marker that opens the system comment written on rejection.
pub const REJECTED_MARKER: &str = "❌";

/// Append-only comment thread attached to a pedido.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pedido_comments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub pedido_id: i32,
    pub user_id: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::pedido::Entity",
        from = "Column::PedidoId",
        to = "super::pedido::Column::Id",
        on_delete = "Cascade"
    )]
    Pedido,
}

impl Related<super::pedido::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Pedido.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr> {
        let mut active_model = self;
        if insert && active_model.created_at.is_not_set() {
            active_model.created_at = Set(Utc::now());
        }
        Ok(active_model)
    }
}

/// Text of the comment appended when a pedido is approved.
pub fn approval_note(comment: Option<&str>) -> String {
    match comment.map(str::trim).filter(|c| !c.is_empty()) {
        Some(comment) => format!("{} Pedido aprobado: {}", APPROVED_MARKER, comment),
        None => format!("{} Pedido aprobado", APPROVED_MARKER),
    }
}

/// Text of the comment appended when a pedido is rejected.
pub fn rejection_note(reason: &str) -> String {
    format!("{} Pedido rechazado: {}", REJECTED_MARKER, reason.trim())
}
