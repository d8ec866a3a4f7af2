use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use super::context::RequestContext;
use super::error::GatewayError;
use crate::acl::{PermissionDecision, PermissionFilter, RowScope};
use crate::database::{DatabaseError, EntityRecord, RowStore, TableSchema, ValidationMode};
use crate::filter::filter_order::FilterOrder;
use crate::filter::FilterData;
use crate::types::{Operation, RecordId};

/// Result of a delete: the row went away, or nothing in scope matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

impl DeleteOutcome {
    pub fn is_deleted(&self) -> bool {
        matches!(self, DeleteOutcome::Deleted)
    }
}

/// Permission-aware CRUD over one table.
///
/// Every operation consults the permission filter exactly once before
/// touching storage. A denial fails the call before any statement runs,
/// and the row scope is conjoined into every statement's conditions, so
/// caller-supplied filters can narrow the visible rows but never widen them.
/// Successful calls record cache tags on the request context.
#[derive(Clone)]
pub struct RelationalGateway {
    schema: TableSchema,
    store: Arc<dyn RowStore>,
    acl: Arc<dyn PermissionFilter>,
}

impl RelationalGateway {
    pub fn new(schema: TableSchema, store: Arc<dyn RowStore>, acl: Arc<dyn PermissionFilter>) -> Self {
        Self { schema, store, acl }
    }

    pub fn table(&self) -> &str {
        &self.schema.name
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    fn authorize(&self, ctx: &RequestContext, operation: Operation) -> Result<PermissionDecision, GatewayError> {
        let mut decision = self.acl.resolve(&ctx.identity, self.table(), operation);
        if !decision.allowed {
            let reason = decision.denied_reason.unwrap_or_else(|| "denied by policy".to_string());
            warn!(
                request_id = %ctx.request_id,
                identity = ctx.identity.id,
                table = self.table(),
                %operation,
                "Permission denied: {}",
                reason
            );
            return Err(GatewayError::denied(self.table(), operation, reason));
        }

        // the table's declared owner column outranks the rule's guess
        if let (RowScope::Owner { column, .. }, Some(owner)) = (&mut decision.row_scope, &self.schema.owner_column) {
            column.clone_from(owner);
        }

        // an owner scope the table cannot express must not degrade into no scope
        if let Some(column) = decision.row_scope.owner_column() {
            if !self.schema.has_column(column) {
                warn!(
                    request_id = %ctx.request_id,
                    table = self.table(),
                    "Owner scope on missing column '{}'",
                    column
                );
                return Err(GatewayError::denied(
                    self.table(),
                    operation,
                    format!("table has no owner column '{}'", column),
                ));
            }
        }
        Ok(decision)
    }

    fn scoped(decision: &PermissionDecision, conditions: Value) -> Value {
        match decision.row_scope.conditions() {
            None => conditions,
            Some(scope) if conditions.is_null() => scope,
            Some(scope) => json!({ "$and": [conditions, scope] }),
        }
    }

    fn check_writable(&self, decision: &PermissionDecision, record: &EntityRecord, operation: Operation) -> Result<(), GatewayError> {
        if let Some(column) = decision.write_blacklist.iter().find(|c| record.contains(c)) {
            return Err(GatewayError::denied(
                self.table(),
                operation,
                format!("column '{}' is not writable", column),
            ));
        }
        Ok(())
    }

    /// Column recording who owns a row: the table's own, else the scope's
    fn owner_column<'a>(&'a self, decision: &'a PermissionDecision) -> Option<&'a str> {
        self.schema.owner_column.as_deref().or_else(|| decision.row_scope.owner_column())
    }

    fn stamp_owner(&self, ctx: &RequestContext, decision: &PermissionDecision, record: &mut EntityRecord) {
        if let Some(column) = self.owner_column(decision) {
            record.set(column.to_string(), ctx.identity.id);
        }
    }

    /// Reject caller filters that select, sort or match on a hidden column
    fn check_readable(&self, decision: &PermissionDecision, filters: &FilterData) -> Result<(), GatewayError> {
        if decision.read_blacklist.is_empty() {
            return Ok(());
        }

        let mut named: Vec<String> = filters.select.clone().unwrap_or_default();
        if let Some(order) = &filters.order {
            named.extend(FilterOrder::validate_and_parse(order).map_err(DatabaseError::from)?.into_iter().map(|o| o.column));
        }
        if let Some(conditions) = &filters.where_clause {
            where_columns(conditions, &mut named);
        }

        match named.iter().find(|c| decision.read_blacklist.contains(c)) {
            Some(column) => Err(GatewayError::denied(
                self.table(),
                Operation::Read,
                format!("column '{}' is not readable", column),
            )),
            None => Ok(()),
        }
    }

    fn shape(decision: &PermissionDecision, mut record: EntityRecord) -> EntityRecord {
        record.strip(&decision.read_blacklist);
        record
    }

    async fn select_scoped(&self, decision: &PermissionDecision, filters: FilterData) -> Result<Vec<EntityRecord>, GatewayError> {
        let filters = match decision.row_scope.conditions() {
            Some(scope) => filters.and_where(scope),
            None => filters,
        };
        let rows = self.store.select(self.table(), filters).await?;
        Ok(rows.into_iter().map(|r| Self::shape(decision, r)).collect())
    }

    /// One row by id, within scope
    pub async fn fetch_by_id(&self, ctx: &mut RequestContext, id: RecordId) -> Result<EntityRecord, GatewayError> {
        let decision = self.authorize(ctx, Operation::Read)?;
        let filters = FilterData { where_clause: Some(json!({ "id": id })), ..Default::default() }.with_limit(1);
        let record = self
            .select_scoped(&decision, filters)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::not_found(self.table()))?;

        ctx.tags.record_row(self.table(), id);
        Ok(record)
    }

    /// Every row in scope matching the caller's filters, in primary-key order unless they say otherwise
    pub async fn fetch_all(&self, ctx: &mut RequestContext, mut filters: FilterData) -> Result<Vec<EntityRecord>, GatewayError> {
        let decision = self.authorize(ctx, Operation::Read)?;
        self.check_readable(&decision, &filters)?;
        if filters.order.is_none() {
            filters.order = Some(json!("id asc"));
        }
        let records = self.select_scoped(&decision, filters).await?;

        debug!(table = self.table(), count = records.len(), "Fetched collection");
        ctx.tags.record_table(self.table());
        Ok(records)
    }

    /// First row in scope matching `conditions`, or `None`
    pub async fn fetch_one_where(
        &self,
        ctx: &mut RequestContext,
        conditions: Value,
        filters: FilterData,
    ) -> Result<Option<EntityRecord>, GatewayError> {
        let decision = self.authorize(ctx, Operation::Read)?;
        self.check_readable(&decision, &filters)?;
        let mut filters = filters.and_where(conditions).with_limit(1);
        if filters.order.is_none() {
            filters.order = Some(json!("id asc"));
        }
        let record = self.select_scoped(&decision, filters).await?.into_iter().next();

        if let Some(id) = record.as_ref().and_then(|r| r.id()) {
            ctx.tags.record_row(self.table(), id);
        }
        Ok(record)
    }

    /// Insert one row. The owner column, when the table has one, always receives the acting identity.
    pub async fn insert(&self, ctx: &mut RequestContext, mut record: EntityRecord) -> Result<RecordId, GatewayError> {
        let decision = self.authorize(ctx, Operation::Create)?;
        self.check_writable(&decision, &record, Operation::Create)?;
        self.stamp_owner(ctx, &decision, &mut record);
        record.validate(&self.schema, ValidationMode::Insert)?;

        let id = self.store.insert(self.table(), &record).await?;
        debug!(request_id = %ctx.request_id, table = self.table(), id, "Inserted row");
        ctx.tags.record_table(self.table());
        Ok(id)
    }

    /// Update the supplied fields of the row named by the payload's `id`.
    /// The owner column is never rewritten. A row outside scope fails as not found rather than silently matching nothing.
    pub async fn update(&self, ctx: &mut RequestContext, mut record: EntityRecord) -> Result<RecordId, GatewayError> {
        let decision = self.authorize(ctx, Operation::Update)?;
        let id = record.take_id()?;
        self.check_writable(&decision, &record, Operation::Update)?;
        // ownership is fixed at insert
        if let Some(previous) = self.owner_column(&decision).and_then(|c| record.remove(c)) {
            debug!(request_id = %ctx.request_id, table = self.table(), "Ignoring owner {} in update", previous);
        }
        record.validate(&self.schema, ValidationMode::Update)?;

        let conditions = Self::scoped(&decision, json!({ "id": id }));
        let affected = self.store.update(self.table(), &record, &conditions).await?;
        if affected == 0 {
            return Err(GatewayError::not_found(self.table()));
        }

        debug!(request_id = %ctx.request_id, table = self.table(), id, "Updated row");
        ctx.tags.record_row(self.table(), id);
        Ok(id)
    }

    /// Delete one row by id. Absent or out-of-scope rows yield `NotFound`, not an error.
    pub async fn delete(&self, ctx: &mut RequestContext, id: RecordId) -> Result<DeleteOutcome, GatewayError> {
        let decision = self.authorize(ctx, Operation::Delete)?;
        let conditions = Self::scoped(&decision, json!({ "id": id }));
        let affected = self.store.delete(self.table(), &conditions).await?;
        if affected == 0 {
            return Ok(DeleteOutcome::NotFound);
        }

        debug!(request_id = %ctx.request_id, table = self.table(), id, "Deleted row");
        ctx.tags.record_row(self.table(), id);
        Ok(DeleteOutcome::Deleted)
    }

    /// Delete every row in scope matching `conditions`, returning how many went away
    pub async fn delete_where(&self, ctx: &mut RequestContext, conditions: Value) -> Result<u64, GatewayError> {
        let decision = self.authorize(ctx, Operation::Delete)?;
        let conditions = Self::scoped(&decision, conditions);
        let affected = self.store.delete(self.table(), &conditions).await?;
        if affected > 0 {
            debug!(request_id = %ctx.request_id, table = self.table(), affected, "Deleted rows");
            ctx.tags.record_table(self.table());
        }
        Ok(affected)
    }
}

/// Every column a where-language expression names
fn where_columns(conditions: &Value, out: &mut Vec<String>) {
    match conditions {
        Value::Object(obj) => {
            for (key, value) in obj {
                if key.starts_with('$') {
                    where_columns(value, out);
                } else {
                    out.push(key.clone());
                }
            }
        }
        Value::Array(branches) => branches.iter().for_each(|b| where_columns(b, out)),
        _ => {}
    }
}
