//! Entity type → repository lookup
//!
//! Populated once at startup and shared read-only afterwards (wrap it in an
//! `Arc`). Lookups are by `TypeId`, so there is no string matching on type
//! names.

use crate::mapping::Entity;
use crate::pool::ConnectionPool;
use crate::repo::GenericRepository;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use tessera_core::{Attachment, Course, Tag, User};

#[derive(Default)]
pub struct RepositoryRegistry {
    repositories: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl RepositoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding a generic repository for every domain record
    pub fn for_domain(pool: &Arc<ConnectionPool>) -> Self {
        let mut registry = Self::new();
        registry
            .register(GenericRepository::<User>::new(Arc::clone(pool)))
            .register(GenericRepository::<Course>::new(Arc::clone(pool)))
            .register(GenericRepository::<Tag>::new(Arc::clone(pool)))
            .register(GenericRepository::<Attachment>::new(Arc::clone(pool)));
        registry
    }

    /// Replaces any repository previously registered for `E`
    pub fn register<E: Entity>(&mut self, repository: GenericRepository<E>) -> &mut Self {
        self.repositories
            .insert(TypeId::of::<E>(), Box::new(repository));
        self
    }

    pub fn with<E: Entity>(mut self, repository: GenericRepository<E>) -> Self {
        self.register(repository);
        self
    }

    pub fn resolve<E: Entity>(&self) -> Option<GenericRepository<E>> {
        self.repositories
            .get(&TypeId::of::<E>())
            .and_then(|repo| repo.downcast_ref::<GenericRepository<E>>())
            .cloned()
    }

    pub fn contains<E: Entity>(&self) -> bool {
        self.repositories.contains_key(&TypeId::of::<E>())
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }
}

impl std::fmt::Debug for RepositoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryRegistry")
            .field("registered", &self.repositories.len())
            .finish()
    }
}
