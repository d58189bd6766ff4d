use crate::{
    db::DbPool,
    entities::articulo::{self, Entity as ArticuloEntity, Sector},
    errors::ServiceError,
};
use sea_orm::{
    sea_query::{Expr, Func},
    ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder,
};
use std::sync::Arc;
use tracing::{error, instrument};

/// Read-only lookup over the stock directory
#[derive(Clone)]
pub struct ArticuloService {
    db_pool: Arc<DbPool>,
}

impl ArticuloService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Ordered by codigo. `search` matches codigo or descripcion, ignoring case.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        sector: Option<Sector>,
        search: Option<&str>,
    ) -> Result<Vec<articulo::Model>, ServiceError> {
        let mut query = ArticuloEntity::find();

        if let Some(sector) = sector {
            query = query.filter(articulo::Column::Sector.eq(sector));
        }

        if let Some(term) = search.map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = format!("%{}%", term.to_lowercase());
            query = query.filter(
                Condition::any()
                    .add(Expr::expr(Func::lower(Expr::col(articulo::Column::Codigo))).like(&pattern))
                    .add(
                        Expr::expr(Func::lower(Expr::col(articulo::Column::Descripcion)))
                            .like(&pattern),
                    ),
            );
        }

        query
            .order_by_asc(articulo::Column::Codigo)
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list articulos");
                ServiceError::DatabaseError(e)
            })
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i32) -> Result<Option<articulo::Model>, ServiceError> {
        Ok(ArticuloEntity::find_by_id(id).one(&*self.db_pool).await?)
    }

    /// Articles at or below their minimum stock, lowest stock first.
    #[instrument(skip(self))]
    pub async fn low_stock(&self) -> Result<Vec<articulo::Model>, ServiceError> {
        Ok(ArticuloEntity::find()
            .filter(Expr::col(articulo::Column::Stock).lte(Expr::col(articulo::Column::StockMinimo)))
            .order_by_asc(articulo::Column::Stock)
            .order_by_asc(articulo::Column::Codigo)
            .all(&*self.db_pool)
            .await?)
    }
}
