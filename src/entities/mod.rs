pub mod articulo;
pub mod notification;
pub mod pedido;
pub mod pedido_comment;
pub mod pedido_item;
pub mod pedido_sequence;
pub mod user_profile;

pub use articulo::Sector;
pub use pedido::ApprovalStatus;
pub use user_profile::UserRole;
