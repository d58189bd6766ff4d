use sea_orm::entity::prelude::*;

/// Name of the counter row that feeds pedido numbers.
pub const PEDIDOS: &str = "pedidos";

/// Monotonic counters; a value handed out is never handed out again.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "pedido_sequences")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub name: String,
    pub last_value: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Human-readable pedido number for a counter value.
pub fn format_numero(value: i64) -> String {
    format!("PED-{:05}", value)
}
