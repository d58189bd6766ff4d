use crate::{
    db::DbPool,
    entities::notification::{self, ActiveModel as NotificationActiveModel, Entity as NotificationEntity},
    errors::ServiceError,
};
use metrics::counter;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

/// Lifecycle transition a notification reports on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Created,
    Approved,
    Rejected,
    Commented,
}

impl NotificationKind {
    /// Value persisted in the `type` column, e.g. `pedido_created`.
    pub fn type_tag(self) -> String {
        format!("pedido_{}", self)
    }

    fn requester_title(self) -> &'static str {
        match self {
            NotificationKind::Created => "Nuevo Pedido Creado",
            NotificationKind::Approved => "Pedido Aprobado",
            NotificationKind::Rejected => "Pedido Rechazado",
            NotificationKind::Commented => "Nuevo Comentario",
        }
    }

    fn requester_message(self, numero: &str, message: Option<&str>) -> String {
        let supplied = message.map(str::trim).filter(|m| !m.is_empty());
        match (self, supplied) {
            // Creation always uses the fixed wording.
            (NotificationKind::Created, _) => {
                format!("Se creó el pedido {}. Pendiente de aprobación.", numero)
            }
            (_, Some(message)) => message.to_string(),
            (NotificationKind::Approved, None) => format!("El pedido {} ha sido aprobado.", numero),
            (NotificationKind::Rejected, None) => {
                format!("El pedido {} ha sido rechazado.", numero)
            }
            (NotificationKind::Commented, None) => {
                format!("Hay un nuevo comentario en el pedido {}.", numero)
            }
        }
    }

    fn broadcast(self, numero: &str) -> Option<(&'static str, String)> {
        match self {
            NotificationKind::Created => Some((
                "Nuevo Pedido Requiere Revisión",
                format!("El pedido {} requiere tu revisión y aprobación.", numero),
            )),
            NotificationKind::Commented => Some((
                "Nuevo Comentario en Pedido",
                format!("Hay un nuevo comentario en el pedido {}.", numero),
            )),
            NotificationKind::Approved | NotificationKind::Rejected => None,
        }
    }
}

/// A notification row that has been decided on but not yet written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedNotification {
    pub user_id: Option<String>,
    pub title: String,
    pub message: String,
    pub notification_type: String,
    pub related_id: i32,
}

/// Fan-out for one lifecycle event: at most one requester-facing row and one broadcast.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NotificationPlan {
    pub requester: Option<PlannedNotification>,
    pub broadcast: Option<PlannedNotification>,
}

impl NotificationPlan {
    pub fn len(&self) -> usize {
        self.requester.is_some() as usize + self.broadcast.is_some() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decides which notifications an event produces. Pure; nothing is written.
pub fn plan(
    pedido_id: i32,
    numero: &str,
    kind: NotificationKind,
    target_user_id: Option<&str>,
    message: Option<&str>,
) -> NotificationPlan {
    let requester = target_user_id
        .filter(|id| !id.is_empty())
        .map(|user_id| PlannedNotification {
            user_id: Some(user_id.to_string()),
            title: kind.requester_title().to_string(),
            message: kind.requester_message(numero, message),
            notification_type: kind.type_tag(),
            related_id: pedido_id,
        });

    let broadcast = kind
        .broadcast(numero)
        .map(|(title, message)| PlannedNotification {
            user_id: None,
            title: title.to_string(),
            message,
            notification_type: kind.type_tag(),
            related_id: pedido_id,
        });

    NotificationPlan {
        requester,
        broadcast,
    }
}

/// Writes one planned notification on any connection, pool or open transaction.
pub async fn emit_one<C>(db: &C, planned: &PlannedNotification) -> Result<notification::Model, DbErr>
where
    C: ConnectionTrait,
{
    let model = NotificationActiveModel {
        user_id: Set(planned.user_id.clone()),
        title: Set(Some(planned.title.clone())),
        message: Set(planned.message.clone()),
        notification_type: Set(planned.notification_type.clone()),
        related_id: Set(Some(planned.related_id)),
        is_read: Set(false),
        ..Default::default()
    }
    .insert(db)
    .await?;

    counter!(
        "printshop_notifications_emitted_total",
        1,
        "type" => planned.notification_type.clone()
    );
    debug!(
        notification_id = model.id,
        related_id = planned.related_id,
        broadcast = planned.user_id.is_none(),
        "notification emitted"
    );

    Ok(model)
}

/// Plans and writes every notification an event produces.
pub async fn emit<C>(
    db: &C,
    pedido_id: i32,
    numero: &str,
    kind: NotificationKind,
    target_user_id: Option<&str>,
    message: Option<&str>,
) -> Result<Vec<notification::Model>, DbErr>
where
    C: ConnectionTrait,
{
    let plan = plan(pedido_id, numero, kind, target_user_id, message);
    let mut written = Vec::with_capacity(plan.len());
    for planned in plan.requester.iter().chain(plan.broadcast.iter()) {
        written.push(emit_one(db, planned).await?);
    }
    Ok(written)
}

/// Read-side access to the notification collection
#[derive(Clone)]
pub struct NotificationService {
    db_pool: Arc<DbPool>,
    list_limit: u64,
}

impl NotificationService {
    pub fn new(db_pool: Arc<DbPool>, list_limit: u64) -> Self {
        Self {
            db_pool,
            list_limit: list_limit.max(1),
        }
    }

    fn scoped(user_id: Option<&str>) -> sea_orm::Select<NotificationEntity> {
        let query = NotificationEntity::find();
        match user_id {
            Some(user_id) => query.filter(notification::Column::UserId.eq(user_id)),
            None => query,
        }
    }

    /// Newest first, capped at the configured limit.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        user_id: Option<&str>,
        unread_only: bool,
    ) -> Result<Vec<notification::Model>, ServiceError> {
        let mut query = Self::scoped(user_id);
        if unread_only {
            query = query.filter(notification::Column::IsRead.eq(false));
        }

        query
            .order_by_desc(notification::Column::CreatedAt)
            .order_by_desc(notification::Column::Id)
            .limit(self.list_limit)
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list notifications");
                ServiceError::DatabaseError(e)
            })
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i32) -> Result<Option<notification::Model>, ServiceError> {
        Ok(NotificationEntity::find_by_id(id).one(&*self.db_pool).await?)
    }

    /// Returns false when no notification has this id.
    #[instrument(skip(self))]
    pub async fn mark_read(&self, id: i32) -> Result<bool, ServiceError> {
        let db = &*self.db_pool;
        if NotificationEntity::find_by_id(id).one(db).await?.is_none() {
            return Ok(false);
        }

        NotificationEntity::update_many()
            .col_expr(notification::Column::IsRead, Expr::value(true))
            .filter(notification::Column::Id.eq(id))
            .exec(db)
            .await?;

        Ok(true)
    }

    /// Marks every unread notification in scope as read; returns how many changed.
    #[instrument(skip(self))]
    pub async fn mark_all_read(&self, user_id: Option<&str>) -> Result<u64, ServiceError> {
        let mut update = NotificationEntity::update_many()
            .col_expr(notification::Column::IsRead, Expr::value(true))
            .filter(notification::Column::IsRead.eq(false));
        if let Some(user_id) = user_id {
            update = update.filter(notification::Column::UserId.eq(user_id));
        }

        let result = update.exec(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, "Failed to mark notifications as read");
            ServiceError::DatabaseError(e)
        })?;

        info!(updated = result.rows_affected, "notifications marked as read");
        Ok(result.rows_affected)
    }

    #[instrument(skip(self))]
    pub async fn unread_count(&self, user_id: Option<&str>) -> Result<u64, ServiceError> {
        Ok(Self::scoped(user_id)
            .filter(notification::Column::IsRead.eq(false))
            .count(&*self.db_pool)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case(NotificationKind::Created, "pedido_created")]
    #[case(NotificationKind::Approved, "pedido_approved")]
    #[case(NotificationKind::Rejected, "pedido_rejected")]
    #[case(NotificationKind::Commented, "pedido_commented")]
    fn type_tags(#[case] kind: NotificationKind, #[case] tag: &str) {
        assert_eq!(kind.type_tag(), tag);
    }

    #[test]
    fn created_with_requester_fans_out_twice() {
        let plan = plan(7, "PED-00007", NotificationKind::Created, Some("u9"), None);
        assert_eq!(plan.len(), 2);

        let requester = plan.requester.unwrap();
        assert_eq!(requester.user_id.as_deref(), Some("u9"));
        assert_eq!(requester.title, "Nuevo Pedido Creado");
        assert!(requester.message.contains("PED-00007"));

        let broadcast = plan.broadcast.unwrap();
        assert_eq!(broadcast.user_id, None);
        assert_eq!(broadcast.title, "Nuevo Pedido Requiere Revisión");
        assert_eq!(broadcast.notification_type, "pedido_created");
        assert_eq!(broadcast.related_id, 7);
    }

    #[test]
    fn created_without_requester_only_broadcasts() {
        let plan = plan(1, "PED-00001", NotificationKind::Created, None, None);
        assert!(plan.requester.is_none());
        assert!(plan.broadcast.is_some());
    }

    #[rstest]
    #[case(NotificationKind::Approved)]
    #[case(NotificationKind::Rejected)]
    fn decisions_skip_unknown_requester(#[case] kind: NotificationKind) {
        assert!(plan(3, "PED-00003", kind, None, Some("ok")).is_empty());
        assert!(plan(3, "PED-00003", kind, Some(""), None).is_empty());
    }

    #[test]
    fn approved_carries_supplied_message_or_default() {
        let with = plan(3, "PED-00003", NotificationKind::Approved, Some("u1"), Some("ok"));
        assert_eq!(with.requester.unwrap().message, "ok");

        let without = plan(3, "PED-00003", NotificationKind::Approved, Some("u1"), Some("  "));
        assert_eq!(
            without.requester.unwrap().message,
            "El pedido PED-00003 ha sido aprobado."
        );
    }

    #[test]
    fn commented_broadcasts_even_without_requester() {
        let plan = plan(4, "PED-00004", NotificationKind::Commented, None, None);
        assert_eq!(
            plan.broadcast.unwrap().message,
            "Hay un nuevo comentario en el pedido PED-00004."
        );
    }

    proptest! {
        #[test]
        fn every_planned_row_points_at_the_pedido(
            id in 1i32..100_000,
            user in proptest::option::of("[a-z0-9-]{1,12}"),
            kind_idx in 0usize..4,
        ) {
            let kinds = [
                NotificationKind::Created,
                NotificationKind::Approved,
                NotificationKind::Rejected,
                NotificationKind::Commented,
            ];
            let kind = kinds[kind_idx];
            let numero = format!("PED-{:05}", id);
            let plan = plan(id, &numero, kind, user.as_deref(), None);

            prop_assert!(plan.len() <= 2);
            prop_assert_eq!(plan.requester.is_some(), user.is_some());
            for row in plan.requester.iter().chain(plan.broadcast.iter()) {
                prop_assert_eq!(row.related_id, id);
                prop_assert_eq!(&row.notification_type, &kind.type_tag());
                prop_assert!(row.message.contains(&numero));
            }
        }
    }
}
