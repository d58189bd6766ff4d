pub mod articulos;
pub mod common;
pub mod notifications;
pub mod pedidos;

use crate::db::DbPool;
use crate::services::{
    articulos::ArticuloService, notifications::NotificationService, pedidos::PedidoService,
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub pedidos: Arc<PedidoService>,
    pub notifications: Arc<NotificationService>,
    pub articulos: Arc<ArticuloService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, notification_list_limit: u64) -> Self {
        Self {
            pedidos: Arc::new(PedidoService::new(db_pool.clone())),
            notifications: Arc::new(NotificationService::new(
                db_pool.clone(),
                notification_list_limit,
            )),
            articulos: Arc::new(ArticuloService::new(db_pool)),
        }
    }
}
