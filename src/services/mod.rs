pub mod articulos;
pub mod notifications;
pub mod pedidos;
