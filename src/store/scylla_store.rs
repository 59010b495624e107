use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scylla::client::session::Session;
use scylla::statement::batch::Batch;
use scylla::value::{CqlValue, Row};
use std::sync::Arc;
use uuid::Uuid;

use super::{AuditRepository, OrderStore, StoreError};
use crate::audit::{sort_history, AuditEvent};
use crate::domain::order::{MoneySummary, Order, OrderItem, OrderStatus};

// ============================================================================
// ScyllaDB Order Store
// ============================================================================
//
// One table, one partition per order:
// - static columns:  the order row, `version` = number of audit rows
// - clustering rows: the audit trail, keyed by sequence_number
//
// Because both live in one partition, a transition is a single conditional
// batch: `UPDATE ... IF version = ?` on the order plus `INSERT ... IF NOT
// EXISTS` on the audit row. Either both apply or neither does, and a racing
// writer can never overwrite an audit row.
//
// ============================================================================

const CREATE_LIFECYCLE_TABLE: &str = "CREATE TABLE IF NOT EXISTS order_lifecycle (
    order_id uuid,
    sequence_number bigint,
    owner_id uuid STATIC,
    status text STATIC,
    items text STATIC,
    subtotal bigint STATIC,
    discount bigint STATIC,
    total bigint STATIC,
    version bigint STATIC,
    created_at timestamp STATIC,
    updated_at timestamp STATIC,
    event_id uuid,
    previous_status text,
    new_status text,
    reason text,
    changed_at timestamp,
    PRIMARY KEY (order_id, sequence_number)
) WITH CLUSTERING ORDER BY (sequence_number ASC)";

const INSERT_ORDER: &str = "INSERT INTO order_lifecycle (
    order_id, owner_id, status, items, subtotal, discount, total, version, created_at, updated_at
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

const UPDATE_ORDER_STATUS: &str = "UPDATE order_lifecycle
    SET status = ?, version = ?, updated_at = ?
    WHERE order_id = ?
    IF version = ?";

const INSERT_AUDIT: &str = "INSERT INTO order_lifecycle (
    order_id, sequence_number, event_id, previous_status, new_status, reason, changed_at
) VALUES (?, ?, ?, ?, ?, ?, ?)
IF NOT EXISTS";

const SELECT_ORDER: &str = "SELECT DISTINCT order_id, owner_id, status, items, subtotal,
    discount, total, version, created_at, updated_at
    FROM order_lifecycle
    WHERE order_id = ?";

const SELECT_VERSION: &str = "SELECT DISTINCT order_id, version
    FROM order_lifecycle
    WHERE order_id = ?";

const SELECT_HISTORY: &str = "SELECT order_id, sequence_number, event_id, previous_status,
    new_status, reason, changed_at
    FROM order_lifecycle
    WHERE order_id = ?
    ORDER BY sequence_number ASC";

const SELECT_LAST_EVENT: &str = "SELECT order_id, sequence_number, event_id, previous_status,
    new_status, reason, changed_at
    FROM order_lifecycle
    WHERE order_id = ?
    ORDER BY sequence_number DESC
    LIMIT 1";

type OrderRow = (
    Uuid,
    Uuid,
    String,
    String,
    i64,
    i64,
    i64,
    i64,
    DateTime<Utc>,
    DateTime<Utc>,
);

// Regular columns read back as null on a partition that has only its
// static (order) row.
type AuditRow = (
    Uuid,
    Option<i64>,
    Option<Uuid>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<DateTime<Utc>>,
);

type AuditValues = (
    Uuid,
    i64,
    Uuid,
    Option<String>,
    String,
    Option<String>,
    DateTime<Utc>,
);

pub struct ScyllaOrderStore {
    session: Arc<Session>,
}

impl ScyllaOrderStore {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Create the table in the session's current keyspace.
    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        self.session.query_unpaged(CREATE_LIFECYCLE_TABLE, &[]).await?;
        tracing::info!("Order lifecycle schema ready");
        Ok(())
    }

    async fn current_version(&self, order_id: Uuid) -> anyhow::Result<Option<i64>> {
        let row = self
            .session
            .query_unpaged(SELECT_VERSION, (order_id,))
            .await?
            .into_rows_result()?
            .maybe_first_row::<(Uuid, Option<i64>)>()?;

        Ok(row.and_then(|(_, version)| version))
    }

    async fn last_event(&self, order_id: Uuid) -> anyhow::Result<Option<AuditEvent>> {
        let row = self
            .session
            .query_unpaged(SELECT_LAST_EVENT, (order_id,))
            .await?
            .into_rows_result()?
            .maybe_first_row::<AuditRow>()?;

        match row {
            Some(row) => audit_from_row(row),
            None => Ok(None),
        }
    }

    async fn ensure_extends_chain(&self, event: &AuditEvent) -> Result<(), StoreError> {
        let previous = self.last_event(event.order_id).await?;
        if event.follows(previous.as_ref()) {
            Ok(())
        } else {
            Err(StoreError::BrokenAuditChain {
                order_id: event.order_id,
                sequence_number: event.sequence_number,
            })
        }
    }

    /// Run a conditional batch and report whether it applied.
    async fn run_conditional<V>(&self, batch: &Batch, values: V) -> anyhow::Result<bool>
    where
        V: scylla::serialize::batch::BatchValues + Send,
    {
        let first = self
            .session
            .batch(batch, values)
            .await?
            .into_rows_result()?
            .maybe_first_row::<Row>()?;
        was_applied(first)
    }
}

fn audit_values(event: &AuditEvent) -> AuditValues {
    (
        event.order_id,
        event.sequence_number,
        event.event_id,
        event.previous_status.map(|s| s.code().to_string()),
        event.new_status.code().to_string(),
        event.reason.clone(),
        event.changed_at,
    )
}

/// `None` for the placeholder row of an order with no audit rows yet.
fn audit_from_row(row: AuditRow) -> anyhow::Result<Option<AuditEvent>> {
    let (order_id, sequence_number, event_id, previous_status, new_status, reason, changed_at) =
        row;

    let Some(sequence_number) = sequence_number else {
        return Ok(None);
    };

    let previous_status = previous_status
        .map(|code| code.parse::<OrderStatus>())
        .transpose()?;
    let new_status = new_status
        .with_context(|| {
            format!("Audit row {} of order {} has no status", sequence_number, order_id)
        })?
        .parse()?;

    Ok(Some(AuditEvent {
        event_id: event_id.context("Audit row without event id")?,
        order_id,
        sequence_number,
        previous_status,
        new_status,
        reason,
        changed_at: changed_at.context("Audit row without timestamp")?,
    }))
}

fn order_from_row(row: OrderRow) -> anyhow::Result<Order> {
    let (
        id,
        owner_id,
        status,
        items_json,
        subtotal,
        discount,
        total,
        version,
        created_at,
        updated_at,
    ) = row;

    let items: Vec<OrderItem> = serde_json::from_str(&items_json)
        .with_context(|| format!("Corrupt items column for order {}", id))?;

    Ok(Order::restore(
        id,
        version,
        owner_id,
        items,
        MoneySummary::new(subtotal, discount, total),
        status.parse()?,
        created_at,
        updated_at,
    ))
}

/// Read the `[applied]` flag a conditional statement returns first.
fn was_applied(first: Option<Row>) -> anyhow::Result<bool> {
    match first.and_then(|row| row.columns.into_iter().next().flatten()) {
        Some(CqlValue::Boolean(applied)) => Ok(applied),
        other => Err(anyhow!("Conditional write returned no [applied] flag: {:?}", other)),
    }
}

#[async_trait]
impl AuditRepository for ScyllaOrderStore {
    async fn events_for_order(&self, order_id: Uuid) -> Result<Vec<AuditEvent>, StoreError> {
        let rows_result = self
            .session
            .query_unpaged(SELECT_HISTORY, (order_id,))
            .await
            .map_err(|e| anyhow!(e))?
            .into_rows_result()
            .map_err(|e| anyhow!(e))?;

        let mut events = Vec::new();
        for row in rows_result.rows::<AuditRow>().map_err(|e| anyhow!(e))? {
            let row = row.map_err(|e| anyhow!(e))?;
            if let Some(event) = audit_from_row(row)? {
                events.push(event);
            }
        }

        sort_history(&mut events);
        tracing::debug!(order_id = %order_id, count = events.len(), "Loaded audit history");
        Ok(events)
    }
}

#[async_trait]
impl OrderStore for ScyllaOrderStore {
    async fn load_order(&self, order_id: Uuid) -> Result<Option<Order>, StoreError> {
        let row = self
            .session
            .query_unpaged(SELECT_ORDER, (order_id,))
            .await
            .map_err(|e| anyhow!(e))?
            .into_rows_result()
            .map_err(|e| anyhow!(e))?
            .maybe_first_row::<OrderRow>()
            .map_err(|e| anyhow!(e))?;

        match row {
            Some(row) => Ok(Some(order_from_row(row)?)),
            None => Ok(None),
        }
    }

    async fn insert_order(&self, order: &Order, creation: &AuditEvent) -> Result<(), StoreError> {
        if self.current_version(order.id).await?.is_some() {
            return Err(StoreError::DuplicateOrder(order.id));
        }
        if !creation.follows(None) {
            return Err(StoreError::BrokenAuditChain {
                order_id: order.id,
                sequence_number: creation.sequence_number,
            });
        }

        let items_json = serde_json::to_string(&order.items).map_err(|e| anyhow!(e))?;

        let mut batch = Batch::default();
        batch.append_statement(INSERT_ORDER);
        batch.append_statement(INSERT_AUDIT);

        let applied = self
            .run_conditional(
                &batch,
                (
                    (
                        order.id,
                        order.owner_id,
                        order.status().code().to_string(),
                        items_json,
                        order.amounts.subtotal,
                        order.amounts.discount,
                        order.amounts.total,
                        order.version,
                        order.created_at,
                        order.updated_at,
                    ),
                    audit_values(creation),
                ),
            )
            .await?;

        // Another writer created the same order between the check and the batch.
        if !applied {
            return Err(StoreError::DuplicateOrder(order.id));
        }

        tracing::info!(
            order_id = %order.id,
            owner_id = %order.owner_id,
            "Inserted order with creation event"
        );
        Ok(())
    }

    async fn commit_transition(
        &self,
        order: &Order,
        expected_version: i64,
        event: &AuditEvent,
    ) -> Result<(), StoreError> {
        self.ensure_extends_chain(event).await?;

        let mut batch = Batch::default();
        batch.append_statement(UPDATE_ORDER_STATUS);
        batch.append_statement(INSERT_AUDIT);

        let applied = self
            .run_conditional(
                &batch,
                (
                    (
                        order.status().code().to_string(),
                        order.version,
                        order.updated_at,
                        order.id,
                        expected_version,
                    ),
                    audit_values(event),
                ),
            )
            .await?;

        if !applied {
            return Err(match self.current_version(order.id).await? {
                None => StoreError::MissingOrder(order.id),
                Some(actual) if actual != expected_version => StoreError::ConcurrencyConflict {
                    order_id: order.id,
                    expected: expected_version,
                    actual,
                },
                Some(_) => StoreError::BrokenAuditChain {
                    order_id: order.id,
                    sequence_number: event.sequence_number,
                },
            });
        }

        tracing::info!(
            order_id = %order.id,
            new_version = order.version,
            new_status = %event.new_status,
            "Committed order transition with audit event"
        );
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
//
// Round trips against a live cluster are run as integration tests; here we
// cover the row mapping only.
//
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn as_row(values: AuditValues) -> AuditRow {
        let (order_id, sequence_number, event_id, previous_status, new_status, reason, changed_at) =
            values;
        (
            order_id,
            Some(sequence_number),
            Some(event_id),
            previous_status,
            Some(new_status),
            reason,
            Some(changed_at),
        )
    }

    #[test]
    fn test_audit_row_mapping() {
        let event = AuditEvent::new(
            Uuid::new_v4(),
            4,
            Some(OrderStatus::Preparing),
            OrderStatus::Confirmed,
            Some("kitchen backlog".to_string()),
            Utc::now(),
        );

        let mapped = audit_from_row(as_row(audit_values(&event))).unwrap();
        assert_eq!(mapped, Some(event));
    }

    #[test]
    fn test_order_only_partition_has_no_events() {
        let row: AuditRow = (Uuid::new_v4(), None, None, None, None, None, None);
        assert_eq!(audit_from_row(row).unwrap(), None);
    }

    #[test]
    fn test_audit_row_with_unknown_status_fails() {
        let row: AuditRow = (
            Uuid::new_v4(),
            Some(1),
            Some(Uuid::new_v4()),
            None,
            Some("SHIPPED".to_string()),
            None,
            Some(Utc::now()),
        );
        assert!(audit_from_row(row).is_err());
    }

    #[test]
    fn test_audit_row_missing_status_fails() {
        let row: AuditRow = (
            Uuid::new_v4(),
            Some(2),
            Some(Uuid::new_v4()),
            Some("PENDING".to_string()),
            None,
            None,
            Some(Utc::now()),
        );
        assert!(audit_from_row(row).is_err());
    }

    #[test]
    fn test_order_row_mapping() {
        let now = Utc::now();
        let product_id = Uuid::new_v4();
        let items = vec![OrderItem { product_id, quantity: 3 }];
        let row: OrderRow = (
            Uuid::new_v4(),
            Uuid::new_v4(),
            "READY".to_string(),
            serde_json::to_string(&items).unwrap(),
            1_200,
            200,
            1_000,
            5,
            now,
            now,
        );

        let order = order_from_row(row).unwrap();
        assert_eq!(order.status(), OrderStatus::Ready);
        assert_eq!(order.version, 5);
        assert_eq!(order.items, items);
        assert_eq!(order.amounts.total, 1_000);
    }

    #[test]
    fn test_applied_flag() {
        let applied = Row {
            columns: vec![Some(CqlValue::Boolean(true))],
        };
        let refused = Row {
            columns: vec![Some(CqlValue::Boolean(false)), Some(CqlValue::BigInt(3))],
        };

        assert!(was_applied(Some(applied)).unwrap());
        assert!(!was_applied(Some(refused)).unwrap());
        assert!(was_applied(None).is_err());
    }
}
