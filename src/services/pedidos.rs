//! Pedido lifecycle engine.
//!
//! A pedido is created `Pendiente` together with its items and moves exactly once to
//! `Aprobado` or `Rechazado`. Every write that belongs to one transition (the pedido
//! row, its items, the system comment and the requester notification) happens in a
//! single database transaction. Decisions are compare-and-swap updates on `version`,
//! so two approvers racing on the same pedido cannot both win.

use crate::{
    auth::{require_approver, UserProfile},
    db::DbPool,
    entities::{
        articulo::{self, Entity as ArticuloEntity},
        pedido::{self, ActiveModel as PedidoActiveModel, ApprovalStatus, Entity as PedidoEntity},
        pedido_comment::{self, approval_note, rejection_note, Entity as PedidoCommentEntity},
        pedido_item::{self, Entity as PedidoItemEntity},
        pedido_sequence::{self, format_numero, Entity as PedidoSequenceEntity},
    },
    errors::ServiceError,
    services::notifications::{self, NotificationKind},
};
use chrono::{Duration as ChronoDuration, Utc};
use metrics::counter;
use sea_orm::{
    sea_query::{Expr, Query, SimpleExpr},
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Operational status a new pedido starts in.
pub const INITIAL_STATUS: &str = "Pendiente";

/// Requested line on a new pedido
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPedidoItem {
    pub articulo_id: i32,
    pub cantidad: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatePedidoInput {
    pub description: String,
    pub items: Vec<NewPedidoItem>,
    pub client_name: Option<String>,
    pub image_url: Option<String>,
    pub cliente_id: Option<String>,
}

/// Free-form edit. Approval fields are intentionally absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePedidoInput {
    pub client_name: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub status: Option<String>,
    pub cliente_id: Option<String>,
    /// Version the caller last read. Defaults to the version read by the edit itself.
    pub version: Option<i32>,
}

impl UpdatePedidoInput {
    pub fn is_empty(&self) -> bool {
        self.client_name.is_none()
            && self.description.is_none()
            && self.image_url.is_none()
            && self.status.is_none()
            && self.cliente_id.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PedidoItemView {
    #[serde(flatten)]
    pub item: pedido_item::Model,
    /// Requested quantity exceeds the stock seen when the line was added.
    pub stock_warning: bool,
}

impl From<pedido_item::Model> for PedidoItemView {
    fn from(item: pedido_item::Model) -> Self {
        Self {
            stock_warning: item.exceeds_stock(),
            item,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PedidoDetail {
    #[serde(flatten)]
    pub pedido: pedido::Model,
    pub items: Vec<PedidoItemView>,
}

/// Normalized creation request after validation
#[derive(Debug, Clone, PartialEq, Eq)]
struct ValidCreate {
    description: String,
    client_name: String,
    image_url: Option<String>,
    cliente_id: Option<String>,
    items: Vec<(i32, i32)>,
}

/// Orphans deleted per transaction by the sweep.
const ORPHAN_BATCH: u64 = 500;

/// `pedidos.id NOT IN (SELECT pedido_id FROM pedido_items)`
fn itemless() -> SimpleExpr {
    pedido::Column::Id.not_in_subquery(
        Query::select()
            .column(pedido_item::Column::PedidoId)
            .from(PedidoItemEntity)
            .to_owned(),
    )
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_create(input: CreatePedidoInput) -> Result<ValidCreate, ServiceError> {
    let description = input.description.trim().to_string();
    if description.is_empty() {
        return Err(ServiceError::validation("Description is required"));
    }
    if input.items.is_empty() {
        return Err(ServiceError::validation(
            "A pedido needs at least one item",
        ));
    }
    if let Some(bad) = input.items.iter().find(|i| i.cantidad < 1) {
        return Err(ServiceError::validation(format!(
            "Cantidad must be at least 1 (articulo {} has {})",
            bad.articulo_id, bad.cantidad
        )));
    }

    let cliente_id = non_empty(input.cliente_id);
    let client_name = non_empty(input.client_name)
        .or_else(|| cliente_id.clone())
        .unwrap_or_else(|| description.clone());

    Ok(ValidCreate {
        description,
        client_name,
        image_url: non_empty(input.image_url),
        cliente_id,
        items: input
            .items
            .into_iter()
            .map(|i| (i.articulo_id, i.cantidad))
            .collect(),
    })
}

fn validate_reason(reason: &str) -> Result<String, ServiceError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(ServiceError::validation("Rejection reason is required"));
    }
    Ok(reason.to_string())
}

enum Decision {
    Approve { comment: Option<String> },
    Reject { reason: String },
}

impl Decision {
    fn target(&self) -> ApprovalStatus {
        match self {
            Decision::Approve { .. } => ApprovalStatus::Aprobado,
            Decision::Reject { .. } => ApprovalStatus::Rechazado,
        }
    }
}

/// Service for the pedido approval workflow
#[derive(Clone)]
pub struct PedidoService {
    db_pool: Arc<DbPool>,
}

impl PedidoService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    async fn begin(&self, operation: &str) -> Result<DatabaseTransaction, ServiceError> {
        self.db_pool.begin().await.map_err(|e| {
            error!(error = %e, operation, "Failed to start transaction");
            ServiceError::DatabaseError(e)
        })
    }

    /// Commits on success, rolls back on failure; the original error wins.
    async fn finish<T>(
        txn: DatabaseTransaction,
        operation: &str,
        result: Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        match result {
            Ok(value) => {
                txn.commit().await.map_err(|e| {
                    error!(error = %e, operation, "Failed to commit transaction");
                    ServiceError::DatabaseError(e)
                })?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = txn.rollback().await {
                    warn!(error = %rollback_err, operation, "Rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Creates a pedido with its items. Either everything is stored or nothing is.
    #[instrument(skip(self, input, requester), fields(requester_id = requester.map(|r| r.id.as_str())))]
    pub async fn create_pedido(
        &self,
        input: CreatePedidoInput,
        requester: Option<&UserProfile>,
    ) -> Result<PedidoDetail, ServiceError> {
        let valid = validate_create(input)?;
        let requester_id = requester.map(|r| r.id.clone());

        let txn = self.begin("create_pedido").await?;
        let result = Self::create_in_txn(&txn, &valid, requester_id.as_deref()).await;
        let detail = Self::finish(txn, "create_pedido", result).await?;

        counter!("printshop_pedidos_created_total", 1);
        info!(
            pedido_id = detail.pedido.id,
            numero = %detail.pedido.numero,
            items = detail.items.len(),
            "Pedido created"
        );

        // Approver broadcast is best-effort and lives outside the transaction.
        let plan = notifications::plan(
            detail.pedido.id,
            &detail.pedido.numero,
            NotificationKind::Created,
            None,
            None,
        );
        if let Some(broadcast) = plan.broadcast {
            if let Err(e) = notifications::emit_one(&*self.db_pool, &broadcast).await {
                warn!(
                    error = %e,
                    pedido_id = detail.pedido.id,
                    "Failed to emit approver broadcast for new pedido"
                );
            }
        }

        Ok(detail)
    }

    async fn create_in_txn(
        txn: &DatabaseTransaction,
        valid: &ValidCreate,
        requester_id: Option<&str>,
    ) -> Result<PedidoDetail, ServiceError> {
        let numero = Self::next_numero(txn).await?;

        let pedido = PedidoActiveModel {
            numero: Set(numero.clone()),
            client_name: Set(valid.client_name.clone()),
            description: Set(valid.description.clone()),
            image_url: Set(valid.image_url.clone()),
            status: Set(INITIAL_STATUS.to_string()),
            approval_status: Set(ApprovalStatus::Pendiente),
            cliente_id: Set(valid.cliente_id.clone()),
            created_by: Set(requester_id.map(str::to_string)),
            approved_by: Set(None),
            approved_at: Set(None),
            rejected_by: Set(None),
            rejected_at: Set(None),
            rejection_reason: Set(None),
            version: Set(1),
            ..Default::default()
        }
        .insert(txn)
        .await
        .map_err(|e| {
            error!(error = %e, numero = %numero, "Failed to insert pedido");
            ServiceError::DatabaseError(e)
        })?;

        let wanted: HashSet<i32> = valid.items.iter().map(|(id, _)| *id).collect();
        let articulos: HashMap<i32, articulo::Model> = ArticuloEntity::find()
            .filter(articulo::Column::Id.is_in(wanted.iter().copied()))
            .all(txn)
            .await?
            .into_iter()
            .map(|a| (a.id, a))
            .collect();

        let mut items = Vec::with_capacity(valid.items.len());
        for (articulo_id, cantidad) in &valid.items {
            let articulo = articulos.get(articulo_id).ok_or_else(|| {
                ServiceError::validation(format!("Articulo {} does not exist", articulo_id))
            })?;

            let item = pedido_item::ActiveModel {
                pedido_id: Set(pedido.id),
                articulo_id: Set(*articulo_id),
                cantidad: Set(*cantidad),
                stock_disponible: Set(articulo.stock),
                ..Default::default()
            }
            .insert(txn)
            .await
            .map_err(|e| {
                error!(error = %e, pedido_id = pedido.id, articulo_id, "Failed to insert pedido item");
                ServiceError::DatabaseError(e)
            })?;

            if item.exceeds_stock() {
                warn!(
                    pedido_id = pedido.id,
                    articulo = %articulo.codigo,
                    cantidad,
                    stock = articulo.stock,
                    "Requested quantity exceeds available stock"
                );
            }
            items.push(PedidoItemView::from(item));
        }

        let plan = notifications::plan(
            pedido.id,
            &numero,
            NotificationKind::Created,
            requester_id,
            None,
        );
        if let Some(requester) = plan.requester {
            notifications::emit_one(txn, &requester).await?;
        }

        Ok(PedidoDetail { pedido, items })
    }

    /// Draws the next pedido number from the counter row.
    async fn next_numero<C: ConnectionTrait>(db: &C) -> Result<String, ServiceError> {
        let bumped = PedidoSequenceEntity::update_many()
            .col_expr(
                pedido_sequence::Column::LastValue,
                Expr::col(pedido_sequence::Column::LastValue).add(1),
            )
            .filter(pedido_sequence::Column::Name.eq(pedido_sequence::PEDIDOS))
            .exec(db)
            .await?;

        if bumped.rows_affected == 0 {
            warn!("Pedido counter row missing; seeding it");
            pedido_sequence::ActiveModel {
                name: Set(pedido_sequence::PEDIDOS.to_string()),
                last_value: Set(1),
            }
            .insert(db)
            .await?;
            return Ok(format_numero(1));
        }

        let sequence = PedidoSequenceEntity::find_by_id(pedido_sequence::PEDIDOS.to_string())
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::InternalError("Pedido counter vanished".to_string()))?;

        Ok(format_numero(sequence.last_value))
    }

    /// Approves a pending pedido. `Ok(None)` when the id is unknown.
    #[instrument(skip(self, approver, comment), fields(approver_id = %approver.id))]
    pub async fn approve_pedido(
        &self,
        pedido_id: i32,
        approver: &UserProfile,
        comment: Option<String>,
    ) -> Result<Option<pedido::Model>, ServiceError> {
        require_approver(approver, "approve")?;

        let decision = Decision::Approve {
            comment: non_empty(comment),
        };
        let txn = self.begin("approve_pedido").await?;
        let result = Self::decide(&txn, pedido_id, approver, decision).await;
        let decided = Self::finish(txn, "approve_pedido", result).await?;

        if let Some(pedido) = &decided {
            counter!("printshop_pedidos_approved_total", 1);
            info!(pedido_id, numero = %pedido.numero, "Pedido approved");
        }
        Ok(decided)
    }

    /// Rejects a pending pedido; the reason is mandatory. `Ok(None)` when the id is unknown.
    #[instrument(skip(self, rejecter, reason), fields(rejecter_id = %rejecter.id))]
    pub async fn reject_pedido(
        &self,
        pedido_id: i32,
        reason: &str,
        rejecter: &UserProfile,
    ) -> Result<Option<pedido::Model>, ServiceError> {
        require_approver(rejecter, "reject")?;
        let reason = validate_reason(reason)?;

        let txn = self.begin("reject_pedido").await?;
        let result = Self::decide(&txn, pedido_id, rejecter, Decision::Reject { reason }).await;
        let decided = Self::finish(txn, "reject_pedido", result).await?;

        if let Some(pedido) = &decided {
            counter!("printshop_pedidos_rejected_total", 1);
            info!(pedido_id, numero = %pedido.numero, "Pedido rejected");
        }
        Ok(decided)
    }

    async fn decide(
        txn: &DatabaseTransaction,
        pedido_id: i32,
        actor: &UserProfile,
        decision: Decision,
    ) -> Result<Option<pedido::Model>, ServiceError> {
        let Some(current) = PedidoEntity::find_by_id(pedido_id).one(txn).await? else {
            return Ok(None);
        };
        if current.approval_status.is_terminal() {
            return Err(ServiceError::AlreadyDecided {
                numero: current.numero,
                status: current.approval_status,
            });
        }

        Self::swap_decision(txn, current, actor, decision).await
    }

    /// Applies `decision` only if the row still matches `current`; the side effects follow the swap.
    async fn swap_decision(
        txn: &DatabaseTransaction,
        current: pedido::Model,
        actor: &UserProfile,
        decision: Decision,
    ) -> Result<Option<pedido::Model>, ServiceError> {
        let pedido_id = current.id;
        let now = Utc::now();
        let target = decision.target();
        let mut changes = PedidoActiveModel {
            approval_status: Set(target),
            version: Set(current.version + 1),
            updated_at: Set(now),
            ..Default::default()
        };
        match &decision {
            Decision::Approve { .. } => {
                changes.approved_by = Set(Some(actor.id.clone()));
                changes.approved_at = Set(Some(now));
                changes.rejected_by = Set(None);
                changes.rejected_at = Set(None);
                changes.rejection_reason = Set(None);
            }
            Decision::Reject { reason } => {
                changes.rejected_by = Set(Some(actor.id.clone()));
                changes.rejected_at = Set(Some(now));
                changes.rejection_reason = Set(Some(reason.clone()));
                changes.approved_by = Set(None);
                changes.approved_at = Set(None);
            }
        }

        let swapped = PedidoEntity::update_many()
            .set(changes)
            .filter(pedido::Column::Id.eq(pedido_id))
            .filter(pedido::Column::Version.eq(current.version))
            .filter(pedido::Column::ApprovalStatus.eq(ApprovalStatus::Pendiente))
            .exec(txn)
            .await?;

        if swapped.rows_affected == 0 {
            // Someone else touched the row between our read and our write.
            let latest = PedidoEntity::find_by_id(pedido_id).one(txn).await?;
            return match latest {
                None => Ok(None),
                Some(p) if p.approval_status.is_terminal() => Err(ServiceError::AlreadyDecided {
                    numero: p.numero,
                    status: p.approval_status,
                }),
                Some(p) => Err(ServiceError::Conflict(format!(
                    "Pedido {} was modified concurrently; retry",
                    p.numero
                ))),
            };
        }

        let (note, kind, message) = match &decision {
            Decision::Approve { comment } => (
                approval_note(comment.as_deref()),
                NotificationKind::Approved,
                comment.clone(),
            ),
            Decision::Reject { reason } => (
                rejection_note(reason),
                NotificationKind::Rejected,
                Some(format!(
                    "El pedido {} ha sido rechazado. Motivo: {}",
                    current.numero, reason
                )),
            ),
        };

        pedido_comment::ActiveModel {
            pedido_id: Set(pedido_id),
            user_id: Set(Some(actor.id.clone())),
            content: Set(note),
            ..Default::default()
        }
        .insert(txn)
        .await?;

        notifications::emit(
            txn,
            pedido_id,
            &current.numero,
            kind,
            current.created_by.as_deref(),
            message.as_deref(),
        )
        .await?;

        let decided = PedidoEntity::find_by_id(pedido_id)
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::InternalError("Decided pedido vanished".to_string()))?;
        Ok(Some(decided))
    }

    /// Appends a comment at any approval status. `Ok(None)` when the id is unknown.
    ///
    /// No `pedido_commented` notification is emitted here.
    #[instrument(skip(self, author, content), fields(author_id = author.map(|a| a.id.as_str())))]
    pub async fn add_comment(
        &self,
        pedido_id: i32,
        author: Option<&UserProfile>,
        content: &str,
    ) -> Result<Option<pedido_comment::Model>, ServiceError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ServiceError::validation("Comment content is required"));
        }

        let db = &*self.db_pool;
        if PedidoEntity::find_by_id(pedido_id).one(db).await?.is_none() {
            return Ok(None);
        }

        let comment = pedido_comment::ActiveModel {
            pedido_id: Set(pedido_id),
            user_id: Set(author.map(|a| a.id.clone())),
            content: Set(content.to_string()),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(|e| {
            error!(error = %e, pedido_id, "Failed to add comment");
            ServiceError::DatabaseError(e)
        })?;

        Ok(Some(comment))
    }

    /// Edits non-approval fields. Empty strings clear nullable fields.
    #[instrument(skip(self, changes, editor), fields(editor_id = %editor.id))]
    pub async fn update_pedido(
        &self,
        pedido_id: i32,
        changes: UpdatePedidoInput,
        editor: &UserProfile,
    ) -> Result<Option<pedido::Model>, ServiceError> {
        let db = &*self.db_pool;
        let Some(current) = PedidoEntity::find_by_id(pedido_id).one(db).await? else {
            return Ok(None);
        };
        if changes.is_empty() {
            return Ok(Some(current));
        }

        let expected_version = changes.version.unwrap_or(current.version);
        let mut active = PedidoActiveModel {
            version: Set(expected_version + 1),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };
        if let Some(client_name) = changes.client_name {
            let client_name = client_name.trim().to_string();
            if client_name.is_empty() {
                return Err(ServiceError::validation("Client name cannot be empty"));
            }
            active.client_name = Set(client_name);
        }
        if let Some(description) = changes.description {
            let description = description.trim().to_string();
            if description.is_empty() {
                return Err(ServiceError::validation("Description cannot be empty"));
            }
            active.description = Set(description);
        }
        if let Some(status) = changes.status {
            let status = status.trim().to_string();
            if status.is_empty() {
                return Err(ServiceError::validation("Status cannot be empty"));
            }
            active.status = Set(status);
        }
        if let Some(image_url) = changes.image_url {
            active.image_url = Set(non_empty(Some(image_url)));
        }
        if let Some(cliente_id) = changes.cliente_id {
            active.cliente_id = Set(non_empty(Some(cliente_id)));
        }

        let updated = Self::swap_edit(db, pedido_id, expected_version, active).await?;
        if let Some(updated) = &updated {
            info!(pedido_id, version = updated.version, "Pedido updated");
        }
        Ok(updated)
    }

    /// Writes `changes` only if the stored version still equals `expected_version`.
    async fn swap_edit<C: ConnectionTrait>(
        db: &C,
        pedido_id: i32,
        expected_version: i32,
        changes: PedidoActiveModel,
    ) -> Result<Option<pedido::Model>, ServiceError> {
        let swapped = PedidoEntity::update_many()
            .set(changes)
            .filter(pedido::Column::Id.eq(pedido_id))
            .filter(pedido::Column::Version.eq(expected_version))
            .exec(db)
            .await
            .map_err(|e| {
                error!(error = %e, pedido_id, "Failed to update pedido");
                ServiceError::DatabaseError(e)
            })?;

        let latest = PedidoEntity::find_by_id(pedido_id).one(db).await?;
        match latest {
            Some(p) if swapped.rows_affected == 0 => {
                counter!("printshop_pedido_conflicts_total", 1);
                Err(ServiceError::Conflict(format!(
                    "Pedido {} is at version {}, not {}; reload and retry",
                    p.numero, p.version, expected_version
                )))
            }
            latest => Ok(latest),
        }
    }

    /// Hard-deletes a pedido with its items and comments. Returns false for unknown ids.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn delete_pedido(&self, pedido_id: i32, actor: &UserProfile) -> Result<bool, ServiceError> {
        require_approver(actor, "delete")?;

        let txn = self.begin("delete_pedido").await?;
        let result = Self::delete_in_txn(&txn, pedido_id).await;
        let deleted = Self::finish(txn, "delete_pedido", result).await?;

        if deleted {
            counter!("printshop_pedidos_deleted_total", 1);
            info!(pedido_id, "Pedido deleted");
        }
        Ok(deleted)
    }

    async fn delete_in_txn<C: ConnectionTrait>(db: &C, pedido_id: i32) -> Result<bool, ServiceError> {
        PedidoCommentEntity::delete_many()
            .filter(pedido_comment::Column::PedidoId.eq(pedido_id))
            .exec(db)
            .await?;
        PedidoItemEntity::delete_many()
            .filter(pedido_item::Column::PedidoId.eq(pedido_id))
            .exec(db)
            .await?;
        let result = PedidoEntity::delete_by_id(pedido_id).exec(db).await?;
        Ok(result.rows_affected > 0)
    }

    #[instrument(skip(self))]
    pub async fn get_pedido(&self, pedido_id: i32) -> Result<Option<PedidoDetail>, ServiceError> {
        let db = &*self.db_pool;
        let Some(pedido) = PedidoEntity::find_by_id(pedido_id).one(db).await? else {
            return Ok(None);
        };
        let items = self.get_pedido_items(pedido_id).await?;
        Ok(Some(PedidoDetail { pedido, items }))
    }

    /// Newest first, optionally restricted to one approval status.
    #[instrument(skip(self))]
    pub async fn list_pedidos(
        &self,
        approval_status: Option<ApprovalStatus>,
    ) -> Result<Vec<pedido::Model>, ServiceError> {
        let mut query = PedidoEntity::find();
        if let Some(status) = approval_status {
            query = query.filter(pedido::Column::ApprovalStatus.eq(status));
        }

        query
            .order_by_desc(pedido::Column::CreatedAt)
            .order_by_desc(pedido::Column::Id)
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list pedidos");
                ServiceError::DatabaseError(e)
            })
    }

    /// Items in insertion order; empty for unknown or deleted pedidos.
    #[instrument(skip(self))]
    pub async fn get_pedido_items(&self, pedido_id: i32) -> Result<Vec<PedidoItemView>, ServiceError> {
        let items = PedidoItemEntity::find()
            .filter(pedido_item::Column::PedidoId.eq(pedido_id))
            .order_by_asc(pedido_item::Column::CreatedAt)
            .order_by_asc(pedido_item::Column::Id)
            .all(&*self.db_pool)
            .await?;
        Ok(items.into_iter().map(PedidoItemView::from).collect())
    }

    /// Comment thread, oldest first.
    #[instrument(skip(self))]
    pub async fn list_comments(&self, pedido_id: i32) -> Result<Vec<pedido_comment::Model>, ServiceError> {
        Ok(PedidoCommentEntity::find()
            .filter(pedido_comment::Column::PedidoId.eq(pedido_id))
            .order_by_asc(pedido_comment::Column::CreatedAt)
            .order_by_asc(pedido_comment::Column::Id)
            .all(&*self.db_pool)
            .await?)
    }

    /// Deletes item-less pedidos older than `grace`, in batches. Returns how many were removed.
    #[instrument(skip(self))]
    pub async fn reconcile_orphans(&self, grace: Duration) -> Result<u64, ServiceError> {
        let grace = ChronoDuration::from_std(grace)
            .map_err(|_| ServiceError::validation("Grace period out of range"))?;
        let cutoff = Utc::now() - grace;

        let mut removed = 0;
        loop {
            let ids: Vec<i32> = PedidoEntity::find()
                .select_only()
                .column(pedido::Column::Id)
                .filter(pedido::Column::CreatedAt.lt(cutoff))
                .filter(itemless())
                .order_by_asc(pedido::Column::Id)
                .limit(ORPHAN_BATCH)
                .into_tuple()
                .all(&*self.db_pool)
                .await?;
            if ids.is_empty() {
                break;
            }

            let txn = self.begin("reconcile_orphans").await?;
            let result = Self::delete_orphans_in_txn(&txn, &ids).await;
            let deleted = Self::finish(txn, "reconcile_orphans", result).await?;
            if deleted > 0 {
                warn!(deleted, first_id = ids[0], "Removed orphaned pedidos without items");
            }
            removed += deleted;

            if (ids.len() as u64) < ORPHAN_BATCH {
                break;
            }
        }

        if removed > 0 {
            counter!("printshop_pedidos_deleted_total", removed);
        }
        info!(removed, "Orphan sweep finished");
        Ok(removed)
    }

    /// Items may have arrived since the batch was selected, so the item-less check is repeated.
    async fn delete_orphans_in_txn<C: ConnectionTrait>(db: &C, ids: &[i32]) -> Result<u64, ServiceError> {
        let still_orphaned = Condition::all()
            .add(pedido::Column::Id.is_in(ids.iter().copied()))
            .add(itemless());

        let orphan_ids: Vec<i32> = PedidoEntity::find()
            .select_only()
            .column(pedido::Column::Id)
            .filter(still_orphaned.clone())
            .into_tuple()
            .all(db)
            .await?;
        if orphan_ids.is_empty() {
            return Ok(0);
        }

        PedidoCommentEntity::delete_many()
            .filter(pedido_comment::Column::PedidoId.is_in(orphan_ids.iter().copied()))
            .exec(db)
            .await?;
        let result = PedidoEntity::delete_many()
            .filter(still_orphaned)
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use crate::db::{establish_connection_with_config, run_migrations, DbConfig};
    use crate::entities::{notification, UserRole};
    use proptest::prelude::*;
    use sea_orm::{DatabaseConnection, PaginatorTrait};

    fn input(description: &str, items: Vec<(i32, i32)>) -> CreatePedidoInput {
        CreatePedidoInput {
            description: description.to_string(),
            items: items
                .into_iter()
                .map(|(articulo_id, cantidad)| NewPedidoItem {
                    articulo_id,
                    cantidad,
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn create_requires_description_and_items() {
        assert_matches!(
            validate_create(input("   ", vec![(1, 1)])),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            validate_create(input("Vinyl stock", vec![])),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            validate_create(input("Vinyl stock", vec![(1, 0)])),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn client_name_falls_back_to_cliente_then_description() {
        let mut req = input(" Vinyl stock ", vec![(7, 3)]);
        let valid = validate_create(req.clone()).unwrap();
        assert_eq!(valid.description, "Vinyl stock");
        assert_eq!(valid.client_name, "Vinyl stock");

        req.cliente_id = Some("cli-9".into());
        assert_eq!(validate_create(req.clone()).unwrap().client_name, "cli-9");

        req.client_name = Some("Imprenta Sur".into());
        assert_eq!(validate_create(req).unwrap().client_name, "Imprenta Sur");
    }

    #[test]
    fn reason_is_trimmed_and_required() {
        assert_eq!(validate_reason("  sin stock ").unwrap(), "sin stock");
        assert_matches!(validate_reason(" \t\n"), Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn item_view_flags_stock_warning() {
        let item = pedido_item::Model {
            id: 1,
            pedido_id: 1,
            articulo_id: 7,
            cantidad: 12,
            stock_disponible: 10,
            created_at: Utc::now(),
        };
        assert!(PedidoItemView::from(item.clone()).stock_warning);
        let within = pedido_item::Model { cantidad: 10, ..item };
        assert!(!PedidoItemView::from(within).stock_warning);
    }

    #[tokio::test]
    async fn empty_items_fail_before_touching_the_store() {
        // A disconnected pool would error on any query; validation must short-circuit.
        let service = PedidoService::new(Arc::new(DatabaseConnection::Disconnected));
        let err = service
            .create_pedido(input("Vinyl stock", vec![]), None)
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
    }

    async fn migrated_pool() -> DbPool {
        let pool = establish_connection_with_config(&DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            ..Default::default()
        })
        .await
        .unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    fn approver() -> UserProfile {
        UserProfile {
            id: "u-compras".into(),
            email: "compras@printshop.test".into(),
            nombre: "Carla Compras".into(),
            role: UserRole::Compras,
            activo: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    async fn pending_pedido(db: &DbPool) -> pedido::Model {
        PedidoActiveModel {
            numero: Set(format_numero(1)),
            client_name: Set("Cliente General".into()),
            description: Set("Lona front".into()),
            status: Set(INITIAL_STATUS.into()),
            approval_status: Set(ApprovalStatus::Pendiente),
            created_by: Set(Some("u-mostrador".into())),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }

    /// (comments, notifications) recorded against the pedido.
    async fn side_effects(db: &DbPool, pedido_id: i32) -> (u64, u64) {
        let comments = PedidoCommentEntity::find()
            .filter(pedido_comment::Column::PedidoId.eq(pedido_id))
            .count(db)
            .await
            .unwrap();
        let notes = notification::Entity::find()
            .filter(notification::Column::RelatedId.eq(pedido_id))
            .count(db)
            .await
            .unwrap();
        (comments, notes)
    }

    #[tokio::test]
    async fn edit_between_read_and_swap_is_a_conflict() {
        let db = migrated_pool().await;
        let read = pending_pedido(&db).await;

        let txn = db.begin().await.unwrap();
        PedidoEntity::update_many()
            .col_expr(pedido::Column::Version, Expr::col(pedido::Column::Version).add(1))
            .filter(pedido::Column::Id.eq(read.id))
            .exec(&txn)
            .await
            .unwrap();
        let result = PedidoService::swap_decision(
            &txn,
            read.clone(),
            &approver(),
            Decision::Approve {
                comment: Some("ok".into()),
            },
        )
        .await;
        txn.commit().await.unwrap();

        assert_matches!(result, Err(ServiceError::Conflict(_)));
        let stored = PedidoEntity::find_by_id(read.id).one(&db).await.unwrap().unwrap();
        assert_eq!(stored.approval_status, ApprovalStatus::Pendiente);
        assert_eq!(stored.version, read.version + 1);
        assert!(stored.approved_by.is_none());
        assert_eq!(side_effects(&db, read.id).await, (0, 0));
    }

    #[tokio::test]
    async fn decision_between_read_and_swap_is_already_decided() {
        let db = migrated_pool().await;
        let read = pending_pedido(&db).await;

        let txn = db.begin().await.unwrap();
        PedidoEntity::update_many()
            .col_expr(pedido::Column::ApprovalStatus, Expr::value(ApprovalStatus::Rechazado))
            .col_expr(pedido::Column::RejectionReason, Expr::value("Duplicado"))
            .col_expr(pedido::Column::Version, Expr::col(pedido::Column::Version).add(1))
            .filter(pedido::Column::Id.eq(read.id))
            .exec(&txn)
            .await
            .unwrap();
        let result = PedidoService::swap_decision(
            &txn,
            read.clone(),
            &approver(),
            Decision::Approve { comment: None },
        )
        .await;
        txn.commit().await.unwrap();

        assert_matches!(
            result,
            Err(ServiceError::AlreadyDecided {
                status: ApprovalStatus::Rechazado,
                ..
            })
        );
        let stored = PedidoEntity::find_by_id(read.id).one(&db).await.unwrap().unwrap();
        assert_eq!(stored.approval_status, ApprovalStatus::Rechazado);
        assert!(stored.approved_by.is_none());
        assert_eq!(side_effects(&db, read.id).await, (0, 0));
    }

    #[tokio::test]
    async fn edit_after_concurrent_edit_is_a_conflict() {
        let db = migrated_pool().await;
        let read = pending_pedido(&db).await;

        let first = PedidoActiveModel {
            description: Set("Lona 2x1".into()),
            version: Set(read.version + 1),
            ..Default::default()
        };
        let stored = PedidoService::swap_edit(&db, read.id, read.version, first)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.version, read.version + 1);

        let second = PedidoActiveModel {
            description: Set("Lona 3x1".into()),
            version: Set(read.version + 1),
            ..Default::default()
        };
        let result = PedidoService::swap_edit(&db, read.id, read.version, second).await;
        assert_matches!(result, Err(ServiceError::Conflict(_)));

        let stored = PedidoEntity::find_by_id(read.id).one(&db).await.unwrap().unwrap();
        assert_eq!(stored.description, "Lona 2x1");
        assert_eq!(stored.version, read.version + 1);
    }

    #[tokio::test]
    async fn edit_of_deleted_pedido_is_not_found() {
        let db = migrated_pool().await;
        let changes = PedidoActiveModel {
            description: Set("Lona".into()),
            version: Set(2),
            ..Default::default()
        };
        assert_matches!(PedidoService::swap_edit(&db, 4040, 1, changes).await, Ok(None));
    }

    proptest! {
        #[test]
        fn whitespace_reasons_never_validate(reason in "[ \t\r\n]{0,16}") {
            prop_assert!(validate_reason(&reason).is_err());
        }

        #[test]
        fn positive_quantities_always_validate(
            quantities in proptest::collection::vec(1i32..10_000, 1..20),
        ) {
            let items = quantities.iter().enumerate().map(|(i, q)| (i as i32 + 1, *q)).collect();
            let valid = validate_create(input("Lona", items)).unwrap();
            prop_assert_eq!(valid.items.len(), quantities.len());
        }

        #[test]
        fn any_non_positive_quantity_rejects(
            good in proptest::collection::vec(1i32..100, 0..5),
            bad in -100i32..=0,
        ) {
            let mut items: Vec<(i32, i32)> = good.iter().map(|q| (1, *q)).collect();
            items.push((2, bad));
            prop_assert!(validate_create(input("Lona", items)).is_err());
        }
    }
}
