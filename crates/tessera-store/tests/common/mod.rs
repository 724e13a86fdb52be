// Shared fixtures for tessera-store integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tessera_core::{Course, Role, User};
use tessera_store::{bootstrap, ConnectionPool, PoolConfig};
use uuid::Uuid;

/// A migrated database file in a temp dir, plus a pool over it
pub struct TestDb {
    pub pool: Arc<ConnectionPool>,
    _dir: TempDir,
}

impl TestDb {
    pub fn new() -> Self {
        Self::with_config(|config| config)
    }

    pub fn with_config(customize: impl FnOnce(PoolConfig) -> PoolConfig) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("tessera.db");
        let config = customize(
            PoolConfig::new(path.to_str().expect("utf-8 temp path"))
                .with_max_connections(4)
                .with_acquire_timeout(Some(Duration::from_secs(5))),
        );
        let pool = ConnectionPool::new(config).expect("open pool");
        bootstrap::initialize(&pool).expect("apply migrations");
        Self { pool, _dir: dir }
    }
}

pub fn user(name: &str, role: Role) -> User {
    User::new(name, format!("{}@tessera.test", name), "hash", role).expect("valid user")
}

pub fn course(title: &str, owner_id: Uuid) -> Course {
    Course::new(title, owner_id, 0).expect("valid course")
}
