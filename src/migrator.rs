use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_user_profiles_table::Migration),
            Box::new(m20240301_000002_create_articulos_table::Migration),
            Box::new(m20240301_000003_create_pedidos_table::Migration),
            Box::new(m20240301_000004_create_pedido_items_table::Migration),
            Box::new(m20240301_000005_create_pedido_comments_table::Migration),
            Box::new(m20240301_000006_create_notifications_table::Migration),
        ]
    }
}

mod m20240301_000001_create_user_profiles_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_user_profiles_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(UserProfiles::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(UserProfiles::Id)
                                .string()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(UserProfiles::Email)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(UserProfiles::Nombre).string().not_null())
                        .col(ColumnDef::new(UserProfiles::Role).string_len(32).not_null())
                        .col(
                            ColumnDef::new(UserProfiles::Activo)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(UserProfiles::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(UserProfiles::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(UserProfiles::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum UserProfiles {
        Table,
        Id,
        Email,
        Nombre,
        Role,
        Activo,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000002_create_articulos_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_articulos_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Articulos::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Articulos::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Articulos::Codigo)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Articulos::Descripcion).string().not_null())
                        .col(ColumnDef::new(Articulos::Sector).string_len(16).not_null())
                        .col(ColumnDef::new(Articulos::Imagen).string().null())
                        .col(
                            ColumnDef::new(Articulos::Stock)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Articulos::StockMinimo)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Articulos::Precio)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Articulos::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Articulos::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_articulos_sector")
                        .table(Articulos::Table)
                        .col(Articulos::Sector)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Articulos::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Articulos {
        Table,
        Id,
        Codigo,
        Descripcion,
        Sector,
        Imagen,
        Stock,
        StockMinimo,
        Precio,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000003_create_pedidos_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_pedidos_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PedidoSequences::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PedidoSequences::Name)
                                .string()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(PedidoSequences::LastValue)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await?;

            // The counter row must exist before the first pedido is numbered.
            manager
                .exec_stmt(
                    Query::insert()
                        .into_table(PedidoSequences::Table)
                        .columns([PedidoSequences::Name, PedidoSequences::LastValue])
                        .values_panic(["pedidos".into(), 0i64.into()])
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Pedidos::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Pedidos::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Pedidos::Numero)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Pedidos::ClientName).string().not_null())
                        .col(ColumnDef::new(Pedidos::Description).text().not_null())
                        .col(ColumnDef::new(Pedidos::ImageUrl).string().null())
                        .col(
                            ColumnDef::new(Pedidos::Status)
                                .string()
                                .not_null()
                                .default("Pendiente"),
                        )
                        .col(
                            ColumnDef::new(Pedidos::ApprovalStatus)
                                .string_len(16)
                                .not_null()
                                .default("Pendiente"),
                        )
                        .col(ColumnDef::new(Pedidos::ClienteId).string().null())
                        .col(ColumnDef::new(Pedidos::CreatedBy).string().null())
                        .col(ColumnDef::new(Pedidos::ApprovedBy).string().null())
                        .col(
                            ColumnDef::new(Pedidos::ApprovedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Pedidos::RejectedBy).string().null())
                        .col(
                            ColumnDef::new(Pedidos::RejectedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Pedidos::RejectionReason).text().null())
                        .col(
                            ColumnDef::new(Pedidos::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(Pedidos::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Pedidos::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_pedidos_approval_status")
                        .table(Pedidos::Table)
                        .col(Pedidos::ApprovalStatus)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_pedidos_created_at")
                        .table(Pedidos::Table)
                        .col(Pedidos::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Pedidos::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PedidoSequences::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum PedidoSequences {
        Table,
        Name,
        LastValue,
    }

    #[derive(DeriveIden)]
    pub(super) enum Pedidos {
        Table,
        Id,
        Numero,
        ClientName,
        Description,
        ImageUrl,
        Status,
        ApprovalStatus,
        ClienteId,
        CreatedBy,
        ApprovedBy,
        ApprovedAt,
        RejectedBy,
        RejectedAt,
        RejectionReason,
        Version,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000004_create_pedido_items_table {

    use super::m20240301_000002_create_articulos_table::Articulos;
    use super::m20240301_000003_create_pedidos_table::Pedidos;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_pedido_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PedidoItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PedidoItems::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(PedidoItems::PedidoId).integer().not_null())
                        .col(ColumnDef::new(PedidoItems::ArticuloId).integer().not_null())
                        .col(ColumnDef::new(PedidoItems::Cantidad).integer().not_null())
                        .col(
                            ColumnDef::new(PedidoItems::StockDisponible)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(PedidoItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_pedido_items_pedido")
                                .from(PedidoItems::Table, PedidoItems::PedidoId)
                                .to(Pedidos::Table, Pedidos::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_pedido_items_articulo")
                                .from(PedidoItems::Table, PedidoItems::ArticuloId)
                                .to(Articulos::Table, Articulos::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_pedido_items_pedido_id")
                        .table(PedidoItems::Table)
                        .col(PedidoItems::PedidoId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PedidoItems::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum PedidoItems {
        Table,
        Id,
        PedidoId,
        ArticuloId,
        Cantidad,
        StockDisponible,
        CreatedAt,
    }
}

mod m20240301_000005_create_pedido_comments_table {

    use super::m20240301_000003_create_pedidos_table::Pedidos;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000005_create_pedido_comments_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PedidoComments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PedidoComments::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(PedidoComments::PedidoId)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PedidoComments::UserId).string().null())
                        .col(ColumnDef::new(PedidoComments::Content).text().not_null())
                        .col(
                            ColumnDef::new(PedidoComments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_pedido_comments_pedido")
                                .from(PedidoComments::Table, PedidoComments::PedidoId)
                                .to(Pedidos::Table, Pedidos::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PedidoComments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum PedidoComments {
        Table,
        Id,
        PedidoId,
        UserId,
        Content,
        CreatedAt,
    }
}

mod m20240301_000006_create_notifications_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000006_create_notifications_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // No FK on related_id: notifications outlive the pedido they point at.
            manager
                .create_table(
                    Table::create()
                        .table(Notifications::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Notifications::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Notifications::UserId).string().null())
                        .col(ColumnDef::new(Notifications::Title).string().null())
                        .col(ColumnDef::new(Notifications::Message).text().not_null())
                        .col(ColumnDef::new(Notifications::Type).string().not_null())
                        .col(ColumnDef::new(Notifications::RelatedId).integer().null())
                        .col(
                            ColumnDef::new(Notifications::IsRead)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Notifications::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_notifications_user_unread")
                        .table(Notifications::Table)
                        .col(Notifications::UserId)
                        .col(Notifications::IsRead)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Notifications::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Notifications {
        Table,
        Id,
        UserId,
        Title,
        Message,
        Type,
        RelatedId,
        IsRead,
        CreatedAt,
    }
}
