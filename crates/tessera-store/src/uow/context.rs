//! Persistence context (unit of work)
//!
//! Stages inserts, updates and deletes in memory and flushes them in one
//! transaction on `commit()`. Staging the same entity twice in the same
//! category replaces the earlier entry, so only the latest state is written.
//!
//! At commit, inserts run first, then updates, then deletes, each group in
//! staging order. Any failure rolls the whole transaction back. The staged
//! set is cleared when `commit()` returns, whatever the outcome.
//!
//! A context is single-owner: it takes `&mut self` for every mutation and
//! holds no connection between commits.

use crate::errors::{invalid_input, rollback_failed, unregistered_repository, Result};
use crate::mapping::{id_text, Entity, ToColumn};
use crate::pool::ConnectionPool;
use crate::repo::GenericRepository;
use crate::uow::registry::RepositoryRegistry;
use rusqlite::Connection;
use std::any::{type_name, TypeId};
use std::sync::Arc;
use std::time::Instant;
use tessera_core::{log_op_end, log_op_error, log_op_start};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Nothing staged
    Idle,
    /// At least one change waits for `commit()`
    Staged,
}

/// What a successful commit wrote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl CommitSummary {
    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.deleted
    }
}

/// One staged write, bound to the repository that will perform it
trait PendingOp: Send {
    fn apply(&self, conn: &Connection) -> Result<()>;
}

struct InsertOp<E: Entity> {
    repository: Option<GenericRepository<E>>,
    entity: E,
}

impl<E: Entity> PendingOp for InsertOp<E> {
    fn apply(&self, conn: &Connection) -> Result<()> {
        resolved(&self.repository)?.save_in(conn, &self.entity)
    }
}

struct UpdateOp<E: Entity> {
    repository: Option<GenericRepository<E>>,
    id: E::Id,
    entity: E,
}

impl<E: Entity> PendingOp for UpdateOp<E> {
    fn apply(&self, conn: &Connection) -> Result<()> {
        resolved(&self.repository)?.update_in(conn, &self.id, &self.entity)
    }
}

struct DeleteOp<E: Entity> {
    repository: Option<GenericRepository<E>>,
    id: E::Id,
}

impl<E: Entity> PendingOp for DeleteOp<E> {
    fn apply(&self, conn: &Connection) -> Result<()> {
        // a missing row is not an error
        resolved(&self.repository)?
            .delete_in(conn, &self.id)
            .map(|_| ())
    }
}

/// Staging resolves lazily; an unregistered type only fails at commit
fn resolved<E: Entity>(repository: &Option<GenericRepository<E>>) -> Result<&GenericRepository<E>> {
    repository
        .as_ref()
        .ok_or_else(|| unregistered_repository(type_name::<E>()))
}

/// Entity type plus rendered id
#[derive(Debug, Clone, PartialEq, Eq)]
struct StageKey {
    type_id: TypeId,
    id: String,
}

impl StageKey {
    fn of<E: Entity>(id: &E::Id) -> Self {
        Self {
            type_id: TypeId::of::<E>(),
            id: id_text::<E>(id),
        }
    }
}

struct Staged {
    key: StageKey,
    op: Box<dyn PendingOp>,
}

#[derive(Default)]
struct PendingChanges {
    inserts: Vec<Staged>,
    updates: Vec<Staged>,
    deletes: Vec<Staged>,
}

impl PendingChanges {
    /// Replace in place when the key is already staged, else append
    fn stage(group: &mut Vec<Staged>, staged: Staged) {
        match group.iter_mut().find(|s| s.key == staged.key) {
            Some(existing) => *existing = staged,
            None => group.push(staged),
        }
    }

    fn len(&self) -> usize {
        self.inserts.len() + self.updates.len() + self.deletes.len()
    }

    fn summary(&self) -> CommitSummary {
        CommitSummary {
            inserted: self.inserts.len(),
            updated: self.updates.len(),
            deleted: self.deletes.len(),
        }
    }

    fn apply(&self, conn: &Connection) -> Result<()> {
        for staged in self
            .inserts
            .iter()
            .chain(&self.updates)
            .chain(&self.deletes)
        {
            staged.op.apply(conn)?;
        }
        Ok(())
    }
}

pub struct PersistenceContext {
    pool: Arc<ConnectionPool>,
    registry: Arc<RepositoryRegistry>,
    pending: PendingChanges,
}

impl PersistenceContext {
    pub fn new(pool: Arc<ConnectionPool>, registry: Arc<RepositoryRegistry>) -> Self {
        Self {
            pool,
            registry,
            pending: PendingChanges::default(),
        }
    }

    pub fn state(&self) -> ContextState {
        if self.pending.len() == 0 {
            ContextState::Idle
        } else {
            ContextState::Staged
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Stage an insert; the entity must already carry its id
    pub fn register_new<E: Entity>(&mut self, entity: E) -> Result<()> {
        let key = Self::key_for::<E>("register_new", entity.id())?;
        let op = InsertOp {
            repository: self.registry.resolve::<E>(),
            entity,
        };
        PendingChanges::stage(&mut self.pending.inserts, Staged { key, op: Box::new(op) });
        Ok(())
    }

    /// Stage a full-row update of `id`
    pub fn register_updated<E: Entity>(&mut self, id: E::Id, entity: E) -> Result<()> {
        let key = Self::key_for::<E>("register_updated", &id)?;
        let op = UpdateOp {
            repository: self.registry.resolve::<E>(),
            id,
            entity,
        };
        PendingChanges::stage(&mut self.pending.updates, Staged { key, op: Box::new(op) });
        Ok(())
    }

    pub fn register_deleted<E: Entity>(&mut self, entity: &E) -> Result<()> {
        self.register_deleted_id::<E>(entity.id().clone())
    }

    pub fn register_deleted_id<E: Entity>(&mut self, id: E::Id) -> Result<()> {
        let key = Self::key_for::<E>("register_deleted", &id)?;
        let op = DeleteOp {
            repository: self.registry.resolve::<E>(),
            id,
        };
        PendingChanges::stage(&mut self.pending.deletes, Staged { key, op: Box::new(op) });
        Ok(())
    }

    fn key_for<E: Entity>(op: &str, id: &E::Id) -> Result<StageKey> {
        if id.is_unset() {
            return Err(invalid_input(op, "entity id is not set").with_table(E::table_name()));
        }
        Ok(StageKey::of::<E>(id))
    }

    /// Flush everything staged in one transaction
    ///
    /// Returns the first failure; if rolling back that failure also fails,
    /// the result is a `RollbackFailed` error whose source is the original.
    pub fn commit(&mut self) -> Result<CommitSummary> {
        let pending = std::mem::take(&mut self.pending);
        if pending.len() == 0 {
            return Ok(CommitSummary::default());
        }

        let summary = pending.summary();
        log_op_start!(
            "commit",
            inserts = summary.inserted,
            updates = summary.updated,
            deletes = summary.deleted
        );
        let start = Instant::now();

        let result = self.flush(&pending);

        let duration_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(()) => {
                log_op_end!("commit", duration_ms = duration_ms, writes = summary.total());
            }
            Err(e) => {
                log_op_error!("commit", e, duration_ms = duration_ms);
            }
        }
        result.map(|()| summary)
    }

    fn flush(&self, pending: &PendingChanges) -> Result<()> {
        let mut conn = self.pool.acquire()?;
        conn.set_auto_commit(false)?;

        let outcome = pending
            .apply(&conn)
            .and_then(|()| conn.set_auto_commit(true));

        if let Err(original) = outcome {
            return match conn.rollback() {
                Ok(()) => Err(original),
                Err(rollback_err) => Err(rollback_failed(rollback_err, original)),
            };
        }
        Ok(())
    }

    /// Discard everything staged; returns how many changes were dropped
    pub fn rollback(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending = PendingChanges::default();
        if dropped > 0 {
            tracing::debug!(op = "discard", dropped, "staged changes discarded");
        }
        dropped
    }
}

impl std::fmt::Debug for PersistenceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceContext")
            .field("state", &self.state())
            .field("pending", &self.pending.len())
            .finish()
    }
}
