use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

/// Line item of a pedido. `stock_disponible` is the article stock observed when the
/// line was added and is never re-read afterwards.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pedido_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub pedido_id: i32,
    pub articulo_id: i32,
    pub cantidad: i32,
    pub stock_disponible: i32,
    pub created_at: DateTime<Utc>,
}

impl Model {
    /// Advisory only: exceeding the snapshot never blocks creation or approval.
    pub fn exceeds_stock(&self) -> bool {
        self.cantidad > self.stock_disponible
    }
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
    #[sea_orm(
        belongs_to = "super::articulo::Entity",
        from = "Column::ArticuloId",
        to = "super::articulo::Column::Id"
    )]
    Articulo,
}

impl Related<super::pedido::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Pedido.def()
    }
}

impl Related<super::articulo::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Articulo.def()
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
