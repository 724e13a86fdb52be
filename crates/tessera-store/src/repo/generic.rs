//! Generic CRUD over any `Entity`
//!
//! Every operation comes in two forms. The plain form borrows a pooled
//! connection for the duration of the call (committing afterwards when the
//! pool hands out manual-commit connections). The `_in` form runs on a
//! caller-supplied connection and leaves transaction control to the caller;
//! the persistence context uses these.
//!
//! SQL is built from the entity descriptor. Identifiers that arrive from
//! callers (filter-free field lookups, sort fields) are checked against
//! [`is_valid_identifier`] before they reach a statement.

use super::filter::{Aggregation, Filter, Page, Sort, WhereClause};
use crate::errors::{data_access, invalid_field, invalid_input, row_not_updated, Result};
use crate::mapping::{id_text, is_valid_identifier, map_row, to_column_name, Entity, ToColumn, Value, ID_FIELD};
use crate::pool::ConnectionPool;
use rusqlite::{params_from_iter, Connection, Row};
use std::marker::PhantomData;
use std::sync::Arc;

/// CRUD for one entity type, backed by a pool
pub struct GenericRepository<E: Entity> {
    pool: Arc<ConnectionPool>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for GenericRepository<E> {
    fn clone(&self) -> Self {
        Self {
            pool: Arc::clone(&self.pool),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> std::fmt::Debug for GenericRepository<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenericRepository")
            .field("table", &E::table_name())
            .finish()
    }
}

impl<E: Entity> GenericRepository<E> {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self {
            pool,
            _entity: PhantomData,
        }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn table(&self) -> &'static str {
        E::table_name()
    }

    // ===== SQL text =====

    /// `SELECT <all columns> FROM <table>`
    pub fn select_sql() -> String {
        format!("SELECT {} FROM {}", E::column_names().join(", "), E::table_name())
    }

    /// Same column list with every column qualified by `alias`, for joins
    pub fn select_sql_as(alias: &str) -> String {
        let columns = E::column_names()
            .iter()
            .map(|c| format!("{}.{}", alias, c))
            .collect::<Vec<_>>()
            .join(", ");
        format!("SELECT {} FROM {} {}", columns, E::table_name(), alias)
    }

    pub fn insert_sql() -> String {
        let columns = E::column_names();
        let placeholders = (1..=columns.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            E::table_name(),
            columns.join(", "),
            placeholders
        )
    }

    /// SET list excludes the id; the id binds last
    pub fn update_sql() -> String {
        let assignments = E::column_names()
            .into_iter()
            .filter(|c| c != ID_FIELD)
            .enumerate()
            .map(|(i, c)| format!("{} = ?{}", c, i + 1))
            .collect::<Vec<_>>();
        format!(
            "UPDATE {} SET {} WHERE {} = ?{}",
            E::table_name(),
            assignments.join(", "),
            ID_FIELD,
            assignments.len() + 1
        )
    }

    pub fn delete_sql() -> String {
        format!("DELETE FROM {} WHERE {} = ?1", E::table_name(), ID_FIELD)
    }

    // ===== Connection handling =====

    /// Run `f` on a pooled connection; commits afterwards in manual mode
    ///
    /// On error the connection goes back to the pool, which rolls back
    /// whatever `f` left open.
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.pool.acquire()?;
        let out = f(&*conn)?;
        if !conn.auto_commit() {
            conn.commit()?;
        }
        Ok(out)
    }

    /// Entity id
    pub fn extract_id(&self, entity: &E) -> E::Id {
        entity.id().clone()
    }

    // ===== Reads =====

    pub fn find_by_id(&self, id: &E::Id) -> Result<Option<E>> {
        self.with_connection(|conn| self.find_by_id_in(conn, id))
    }

    pub fn find_by_id_in(&self, conn: &Connection, id: &E::Id) -> Result<Option<E>> {
        Ok(self.find_by_field_in(conn, ID_FIELD, id)?.into_iter().next())
    }

    /// All rows whose `field` equals `value`, in storage order
    pub fn find_by_field(&self, field: &str, value: impl ToColumn) -> Result<Vec<E>> {
        self.with_connection(|conn| self.find_by_field_in(conn, field, value))
    }

    pub fn find_by_field_in(
        &self,
        conn: &Connection,
        field: &str,
        value: impl ToColumn,
    ) -> Result<Vec<E>> {
        let column = checked_column("find_by_field", field)?;
        let sql = format!("{} WHERE {} = ?1", Self::select_sql(), column);
        self.query_entities(conn, "find_by_field", &sql, &[value.to_column()])
    }

    pub fn find_all(&self) -> Result<Vec<E>> {
        self.find_all_by(None, None, Page::all())
    }

    pub fn find_all_in(&self, conn: &Connection) -> Result<Vec<E>> {
        self.find_all_by_in(conn, None, None, Page::all())
    }

    pub fn find_all_by(
        &self,
        filter: Option<&dyn Filter>,
        sort: Option<&Sort>,
        page: Page,
    ) -> Result<Vec<E>> {
        self.with_connection(|conn| self.find_all_by_in(conn, filter, sort, page))
    }

    pub fn find_all_by_in(
        &self,
        conn: &Connection,
        filter: Option<&dyn Filter>,
        sort: Option<&Sort>,
        page: Page,
    ) -> Result<Vec<E>> {
        self.find_all_from_in(conn, &Self::select_sql(), filter, sort, page)
    }

    /// Like `find_all_by`, starting from a caller-supplied SELECT
    ///
    /// `base_query` must produce every entity column by name and must not
    /// carry its own WHERE, ORDER BY or LIMIT; those are appended here.
    pub fn find_all_from(
        &self,
        base_query: &str,
        filter: Option<&dyn Filter>,
        sort: Option<&Sort>,
        page: Page,
    ) -> Result<Vec<E>> {
        self.with_connection(|conn| self.find_all_from_in(conn, base_query, filter, sort, page))
    }

    pub fn find_all_from_in(
        &self,
        conn: &Connection,
        base_query: &str,
        filter: Option<&dyn Filter>,
        sort: Option<&Sort>,
        page: Page,
    ) -> Result<Vec<E>> {
        let mut clause = WhereClause::new();
        if let Some(filter) = filter {
            filter.apply(&mut clause);
        }
        clause
            .ensure_valid("find_all")
            .map_err(|e| e.with_table(E::table_name()))?;

        let mut sql = String::from(base_query);
        sql.push_str(&clause.to_sql());
        if let Some(sort) = sort {
            let column = checked_column("find_all", sort.field())?;
            sql.push_str(&format!(" ORDER BY {} {}", column, sort.direction()));
        }
        sql.push_str(" LIMIT ? OFFSET ?");

        let mut params = clause.into_params();
        params.extend(page.bind_values());
        self.query_entities(conn, "find_all", &sql, &params)
    }

    pub fn count(&self) -> Result<u64> {
        self.count_by(None)
    }

    pub fn count_by(&self, filter: Option<&dyn Filter>) -> Result<u64> {
        self.with_connection(|conn| self.count_by_in(conn, filter))
    }

    pub fn count_by_in(&self, conn: &Connection, filter: Option<&dyn Filter>) -> Result<u64> {
        let mut clause = WhereClause::new();
        if let Some(filter) = filter {
            filter.apply(&mut clause);
        }
        clause
            .ensure_valid("count")
            .map_err(|e| e.with_table(E::table_name()))?;
        let sql = format!("SELECT COUNT(*) FROM {}{}", E::table_name(), clause.to_sql());
        let count: i64 = conn
            .query_row(&sql, params_from_iter(clause.params()), |row| row.get(0))
            .map_err(|e| data_access("count", &sql, e).with_table(E::table_name()))?;
        Ok(count.max(0) as u64)
    }

    /// Grouped query; `mapper` turns each result row into a `T`
    pub fn group_by<T, M>(&self, aggregation: &dyn Aggregation, mapper: M) -> Result<Vec<T>>
    where
        M: Fn(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.with_connection(|conn| self.group_by_in(conn, aggregation, mapper))
    }

    pub fn group_by_in<T, M>(
        &self,
        conn: &Connection,
        aggregation: &dyn Aggregation,
        mapper: M,
    ) -> Result<Vec<T>>
    where
        M: Fn(&Row<'_>) -> rusqlite::Result<T>,
    {
        if let Some(field) = aggregation.rejected_fields().first() {
            return Err(invalid_field("group_by", field).with_table(E::table_name()));
        }
        let mut select = Vec::new();
        let mut group_by = Vec::new();
        aggregation.apply(&mut select, &mut group_by);
        if select.is_empty() {
            return Err(invalid_input("group_by", "aggregation selected no columns")
                .with_table(E::table_name()));
        }

        let mut sql = format!("SELECT {} FROM {}", select.join(", "), E::table_name());
        if !group_by.is_empty() {
            sql.push_str(&format!(" GROUP BY {}", group_by.join(", ")));
        }
        self.query_map_in(conn, "group_by", &sql, &[], mapper)
    }

    /// Bespoke SELECT with a dedicated row mapper
    pub fn query_map_in<T, M>(
        &self,
        conn: &Connection,
        op: &str,
        sql: &str,
        params: &[Value],
        mapper: M,
    ) -> Result<Vec<T>>
    where
        M: Fn(&Row<'_>) -> rusqlite::Result<T>,
    {
        let table = E::table_name();
        tracing::debug!(table, sql, op, "query");

        let mut stmt = conn
            .prepare_cached(sql)
            .map_err(|e| data_access(op, sql, e).with_table(table))?;
        let mut rows = stmt
            .query(params_from_iter(params))
            .map_err(|e| data_access(op, sql, e).with_table(table))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| data_access(op, sql, e).with_table(table))?
        {
            out.push(mapper(row).map_err(|e| data_access(op, sql, e).with_table(table))?);
        }
        Ok(out)
    }

    /// Bespoke statement; returns rows affected
    pub fn execute_in(&self, conn: &Connection, op: &str, sql: &str, params: &[Value]) -> Result<usize> {
        tracing::debug!(table = E::table_name(), sql, op, "execute");
        conn.execute(sql, params_from_iter(params))
            .map_err(|e| data_access(op, sql, e).with_table(E::table_name()))
    }

    fn query_entities(&self, conn: &Connection, op: &str, sql: &str, params: &[Value]) -> Result<Vec<E>> {
        let table = E::table_name();
        tracing::debug!(table, sql, op, "query");

        let mut stmt = conn
            .prepare_cached(sql)
            .map_err(|e| data_access(op, sql, e).with_table(table))?;
        let mut rows = stmt
            .query(params_from_iter(params))
            .map_err(|e| data_access(op, sql, e).with_table(table))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| data_access(op, sql, e).with_table(table))?
        {
            out.push(map_row::<E>(row)?);
        }
        Ok(out)
    }

    // ===== Writes =====

    pub fn save(&self, entity: &E) -> Result<()> {
        self.with_connection(|conn| self.save_in(conn, entity))
    }

    pub fn save_in(&self, conn: &Connection, entity: &E) -> Result<()> {
        let sql = Self::insert_sql();
        tracing::debug!(table = E::table_name(), sql = %sql, "insert");
        conn.prepare_cached(&sql)
            .and_then(|mut stmt| stmt.execute(params_from_iter(entity.values())))
            .map_err(|e| self.write_error("save", &sql, e, entity.id()))?;
        Ok(())
    }

    /// Insert several entities with one prepared statement
    ///
    /// On an auto-commit connection the batch runs in its own transaction, so
    /// either every row lands or none does.
    pub fn save_all(&self, entities: &[E]) -> Result<usize> {
        self.with_connection(|conn| self.save_all_in(conn, entities))
    }

    pub fn save_all_in(&self, conn: &Connection, entities: &[E]) -> Result<usize> {
        if entities.is_empty() {
            return Ok(0);
        }
        self.in_batch(conn, |conn| {
            let sql = Self::insert_sql();
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| data_access("save_all", &sql, e).with_table(E::table_name()))?;
            for entity in entities {
                stmt.execute(params_from_iter(entity.values()))
                    .map_err(|e| self.write_error("save_all", &sql, e, entity.id()))?;
            }
            Ok(entities.len())
        })
    }

    /// Overwrite every non-id column of the row with `id`
    ///
    /// Fails with a data-access error when no row has that id.
    pub fn update(&self, id: &E::Id, entity: &E) -> Result<()> {
        self.with_connection(|conn| self.update_in(conn, id, entity))
    }

    pub fn update_in(&self, conn: &Connection, id: &E::Id, entity: &E) -> Result<()> {
        let sql = Self::update_sql();
        let mut stmt = conn
            .prepare_cached(&sql)
            .map_err(|e| data_access("update", &sql, e).with_table(E::table_name()))?;
        self.run_update(&mut stmt, &sql, id, entity)
    }

    pub fn update_all(&self, items: &[(E::Id, E)]) -> Result<usize> {
        self.with_connection(|conn| self.update_all_in(conn, items))
    }

    pub fn update_all_in(&self, conn: &Connection, items: &[(E::Id, E)]) -> Result<usize> {
        if items.is_empty() {
            return Ok(0);
        }
        self.in_batch(conn, |conn| {
            let sql = Self::update_sql();
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| data_access("update_all", &sql, e).with_table(E::table_name()))?;
            for (id, entity) in items {
                self.run_update(&mut stmt, &sql, id, entity)?;
            }
            Ok(items.len())
        })
    }

    fn run_update(
        &self,
        stmt: &mut rusqlite::Statement<'_>,
        sql: &str,
        id: &E::Id,
        entity: &E,
    ) -> Result<()> {
        let mut params: Vec<Value> = E::field_names()
            .iter()
            .zip(entity.values())
            .filter(|(field, _)| **field != ID_FIELD)
            .map(|(_, value)| value)
            .collect();
        params.push(id.to_column());

        let changed = stmt
            .execute(params_from_iter(params))
            .map_err(|e| self.write_error("update", sql, e, id))?;
        if changed == 0 {
            return Err(row_not_updated(E::table_name(), sql, &id_text::<E>(id)));
        }
        Ok(())
    }

    /// Delete by id; a missing id is not an error. Returns rows removed.
    pub fn delete(&self, id: &E::Id) -> Result<usize> {
        self.with_connection(|conn| self.delete_in(conn, id))
    }

    pub fn delete_in(&self, conn: &Connection, id: &E::Id) -> Result<usize> {
        let sql = Self::delete_sql();
        conn.prepare_cached(&sql)
            .and_then(|mut stmt| stmt.execute([id.to_column()]))
            .map_err(|e| self.write_error("delete", &sql, e, id))
    }

    pub fn delete_all(&self, ids: &[E::Id]) -> Result<usize> {
        self.with_connection(|conn| self.delete_all_in(conn, ids))
    }

    pub fn delete_all_in(&self, conn: &Connection, ids: &[E::Id]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.in_batch(conn, |conn| {
            let mut removed = 0;
            for id in ids {
                removed += self.delete_in(conn, id)?;
            }
            Ok(removed)
        })
    }

    /// Run a batch atomically when the caller has no transaction open
    fn in_batch<T>(&self, conn: &Connection, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        if !conn.is_autocommit() {
            return f(conn);
        }
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| data_access("begin", "BEGIN", e).with_table(E::table_name()))?;
        let out = f(&*tx)?;
        tx.commit()
            .map_err(|e| data_access("commit", "COMMIT", e).with_table(E::table_name()))?;
        Ok(out)
    }

    fn write_error(&self, op: &str, sql: &str, err: rusqlite::Error, id: &E::Id) -> tessera_core::ExError {
        data_access(op, sql, err)
            .with_table(E::table_name())
            .with_entity_id(id_text::<E>(id))
    }
}

fn checked_column(op: &str, field: &str) -> Result<String> {
    let column = to_column_name(field);
    if !is_valid_identifier(&column) {
        return Err(invalid_field(op, field));
    }
    Ok(column)
}
