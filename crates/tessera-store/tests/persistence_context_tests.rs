// Integration tests for the persistence context
// Staging, atomic commit, rollback of partial work and registry lookup

mod common;

use common::{course, user, TestDb};
use rusqlite::hooks::{AuthAction, AuthContext, Authorization, TransactionOperation};
use rusqlite::Connection;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tessera_core::{ExError, ExErrorKind, Role, Tag, User};
use tessera_store::{
    db, ConnectionManager, ConnectionPool, ContextState, GenericRepository, PersistenceContext,
    PoolConfig, RepositoryRegistry,
};
use uuid::Uuid;

/// Opens connections on which every ROLLBACK statement is refused
struct RollbackRefusingManager {
    url: String,
}

impl ConnectionManager for RollbackRefusingManager {
    fn connect(&self) -> tessera_store::Result<Connection> {
        let conn = db::open(&self.url)?;
        conn.authorizer(Some(|ctx: AuthContext<'_>| match ctx.action {
            AuthAction::Transaction {
                operation: TransactionOperation::Rollback,
            } => Authorization::Deny,
            _ => Authorization::Allow,
        }));
        Ok(conn)
    }
}

fn context(db: &TestDb) -> PersistenceContext {
    let registry = Arc::new(RepositoryRegistry::for_domain(&db.pool));
    PersistenceContext::new(db.pool.clone(), registry)
}

#[test]
fn test_commit_writes_all_groups() {
    let db = TestDb::new();
    let mut ctx = context(&db);
    let grace = user("grace", Role::Instructor);
    let systems = course("Systems", grace.id);

    ctx.register_new(grace.clone()).unwrap();
    ctx.register_new(systems.clone()).unwrap();
    ctx.register_new(Tag::new(1, "systems").unwrap()).unwrap();
    assert_eq!(ctx.state(), ContextState::Staged);
    assert_eq!(ctx.pending_count(), 3);

    let summary = ctx.commit().unwrap();
    assert_eq!(summary.inserted, 3);
    assert_eq!(summary.total(), 3);
    assert_eq!(ctx.state(), ContextState::Idle);

    let users: GenericRepository<User> = GenericRepository::new(db.pool.clone());
    assert!(users.find_by_id(&grace.id).unwrap().is_some());
}

#[test]
fn test_empty_commit_is_a_noop() {
    let db = TestDb::new();
    let mut ctx = context(&db);
    assert_eq!(ctx.commit().unwrap().total(), 0);
    assert_eq!(ctx.state(), ContextState::Idle);
}

#[test]
fn test_failure_rolls_back_the_whole_commit() {
    let db = TestDb::new();
    let mut ctx = context(&db);

    // Given: A valid insert staged next to an update of a row that does not exist
    ctx.register_new(Tag::new(1, "kept?").unwrap()).unwrap();
    ctx.register_updated(99, Tag::new(99, "ghost").unwrap())
        .unwrap();

    // When: The context commits
    let err = ctx.commit().unwrap_err();

    // Then: The insert was undone and nothing stays staged
    assert_eq!(err.kind(), ExErrorKind::DataAccess);
    assert_eq!(err.entity_id(), Some("99"));
    let tags: GenericRepository<Tag> = GenericRepository::new(db.pool.clone());
    assert_eq!(tags.count().unwrap(), 0);
    assert_eq!(ctx.pending_count(), 0);

    // And: The pool is still usable
    ctx.register_new(Tag::new(1, "retry").unwrap()).unwrap();
    ctx.commit().unwrap();
    assert_eq!(tags.count().unwrap(), 1);
}

#[test]
fn test_inserts_run_before_updates_and_deletes() {
    let db = TestDb::new();
    let mut ctx = context(&db);

    // staged in reverse of the order they must run
    ctx.register_deleted_id::<Tag>(2).unwrap();
    ctx.register_updated(1, Tag::new(1, "renamed").unwrap())
        .unwrap();
    ctx.register_new(Tag::new(1, "fresh").unwrap()).unwrap();
    ctx.register_new(Tag::new(2, "doomed").unwrap()).unwrap();

    let summary = ctx.commit().unwrap();
    assert_eq!((summary.inserted, summary.updated, summary.deleted), (2, 1, 1));

    let tags: GenericRepository<Tag> = GenericRepository::new(db.pool.clone());
    // records compare by id, so check the name too
    let left: Vec<(i64, String)> = tags
        .find_all()
        .unwrap()
        .into_iter()
        .map(|t| (t.id, t.name))
        .collect();
    assert_eq!(left, vec![(1, "renamed".to_string())]);
}

#[test]
fn test_restaging_keeps_only_the_latest_state() {
    let db = TestDb::new();
    let tags: GenericRepository<Tag> = GenericRepository::new(db.pool.clone());
    tags.save(&Tag::new(1, "first").unwrap()).unwrap();

    let mut ctx = context(&db);
    ctx.register_updated(1, Tag::new(1, "second").unwrap())
        .unwrap();
    ctx.register_updated(1, Tag::new(1, "third").unwrap())
        .unwrap();
    assert_eq!(ctx.pending_count(), 1);

    assert_eq!(ctx.commit().unwrap().updated, 1);
    assert_eq!(tags.find_by_id(&1).unwrap().unwrap().name, "third");
}

#[test]
fn test_deleting_a_missing_row_is_not_an_error() {
    let db = TestDb::new();
    let mut ctx = context(&db);
    let stranger = user("nobody", Role::Student);

    ctx.register_deleted(&stranger).unwrap();
    let summary = ctx.commit().unwrap();
    assert_eq!(summary.deleted, 1);
}

#[test]
fn test_unset_id_is_rejected_when_staged() {
    let db = TestDb::new();
    let mut ctx = context(&db);
    let mut anonymous = user("anon", Role::Student);
    anonymous.id = Uuid::nil();

    let err = ctx.register_new(anonymous).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::InvalidInput);
    assert_eq!(err.table(), Some("users"));
    assert_eq!(ctx.state(), ContextState::Idle);
}

#[test]
fn test_unregistered_type_fails_at_commit() {
    let db = TestDb::new();
    let registry = RepositoryRegistry::new().with(GenericRepository::<Tag>::new(db.pool.clone()));
    let mut ctx = PersistenceContext::new(db.pool.clone(), Arc::new(registry));

    // Given: Staging succeeds even though users have no repository
    ctx.register_new(Tag::new(1, "t").unwrap()).unwrap();
    ctx.register_new(user("ada", Role::Student)).unwrap();

    // When: Commit resolves the staged writes
    let err = ctx.commit().unwrap_err();

    // Then: It reports the missing repository and keeps nothing
    assert_eq!(err.kind(), ExErrorKind::Configuration);
    let tags: GenericRepository<Tag> = GenericRepository::new(db.pool.clone());
    assert_eq!(tags.count().unwrap(), 0);
}

#[test]
fn test_rollback_discards_staged_changes() {
    let db = TestDb::new();
    let mut ctx = context(&db);
    ctx.register_new(Tag::new(1, "a").unwrap()).unwrap();
    ctx.register_new(Tag::new(2, "b").unwrap()).unwrap();

    assert_eq!(ctx.rollback(), 2);
    assert_eq!(ctx.rollback(), 0);
    assert_eq!(ctx.commit().unwrap().total(), 0);

    let tags: GenericRepository<Tag> = GenericRepository::new(db.pool.clone());
    assert_eq!(tags.count().unwrap(), 0);
}

#[test]
fn test_commit_returns_connection_to_pool() {
    let db = TestDb::with_config(|c| c.with_max_connections(1));
    let mut ctx = context(&db);

    for id in 1..=3 {
        ctx.register_new(Tag::new(id, format!("t{}", id)).unwrap())
            .unwrap();
        ctx.commit().unwrap();
    }
    ctx.register_updated(7, Tag::new(7, "x").unwrap()).unwrap();
    assert!(ctx.commit().is_err());

    assert_eq!(db.pool.checked_out(), 0);
    assert_eq!(db.pool.idle_count(), 1);
}

#[test]
fn test_failed_rollback_is_reported_with_original_cause() {
    // Given: A migrated database reached through connections that cannot roll back
    let db = TestDb::new();
    let url = db.pool.config().url().to_string();
    let pool = ConnectionPool::with_manager(
        PoolConfig::new(url.as_str())
            .with_max_connections(1)
            .with_acquire_timeout(Some(Duration::from_secs(5))),
        RollbackRefusingManager { url },
    )
    .unwrap();
    let registry = Arc::new(RepositoryRegistry::for_domain(&pool));
    let mut ctx = PersistenceContext::new(Arc::clone(&pool), registry);

    // When: The second write of a commit fails
    ctx.register_new(Tag::new(1, "orphan").unwrap()).unwrap();
    ctx.register_updated(99, Tag::new(99, "ghost").unwrap())
        .unwrap();
    let err = ctx.commit().unwrap_err();

    // Then: The rollback failure comes back with the write failure as its source
    assert_eq!(err.kind(), ExErrorKind::RollbackFailed);
    assert_eq!(err.sql(), Some("ROLLBACK"));
    let source = err
        .source()
        .and_then(|s| s.downcast_ref::<ExError>())
        .expect("original failure as source");
    assert_eq!(source.kind(), ExErrorKind::DataAccess);
    assert_eq!(source.entity_id(), Some("99"));

    // And: Nothing is left staged or checked out
    assert_eq!(ctx.pending_count(), 0);
    assert_eq!(pool.checked_out(), 0);

    // And: The half-applied insert never became visible
    let tags: GenericRepository<Tag> = GenericRepository::new(db.pool.clone());
    assert_eq!(tags.count().unwrap(), 0);
    pool.shutdown();
}
