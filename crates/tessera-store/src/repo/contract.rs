//! The repository contract
//!
//! Specialized repositories wrap a [`GenericRepository`] and expose it through
//! `generic()`; every CRUD operation then comes for free from the default
//! methods below. A specialization adds its own finders as inherent methods.

use super::filter::{Aggregation, Filter, Page, Sort};
use super::generic::GenericRepository;
use crate::errors::Result;
use crate::mapping::{Entity, ToColumn};
use rusqlite::Row;

/// Id type of a repository's entity
pub type IdOf<R> = <<R as Repository>::Entity as Entity>::Id;

pub trait Repository {
    type Entity: Entity;

    fn generic(&self) -> &GenericRepository<Self::Entity>;

    fn find_by_id(&self, id: &<Self::Entity as Entity>::Id) -> Result<Option<Self::Entity>> {
        self.generic().find_by_id(id)
    }

    /// Every row whose `field` equals `value`
    fn find_by_field(&self, field: &str, value: impl ToColumn) -> Result<Vec<Self::Entity>>
    where
        Self: Sized,
    {
        self.generic().find_by_field(field, value)
    }

    fn find_all(&self) -> Result<Vec<Self::Entity>> {
        self.generic().find_all()
    }

    fn find_all_by(
        &self,
        filter: Option<&dyn Filter>,
        sort: Option<&Sort>,
        page: Page,
    ) -> Result<Vec<Self::Entity>> {
        self.generic().find_all_by(filter, sort, page)
    }

    /// Filtered, sorted page starting from a caller-supplied SELECT
    fn find_all_from(
        &self,
        base_query: &str,
        filter: Option<&dyn Filter>,
        sort: Option<&Sort>,
        page: Page,
    ) -> Result<Vec<Self::Entity>> {
        self.generic().find_all_from(base_query, filter, sort, page)
    }

    fn count(&self) -> Result<u64> {
        self.generic().count()
    }

    fn count_by(&self, filter: Option<&dyn Filter>) -> Result<u64> {
        self.generic().count_by(filter)
    }

    fn group_by<T, M>(&self, aggregation: &dyn Aggregation, mapper: M) -> Result<Vec<T>>
    where
        Self: Sized,
        M: Fn(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.generic().group_by(aggregation, mapper)
    }

    fn save(&self, entity: &Self::Entity) -> Result<()> {
        self.generic().save(entity)
    }

    fn save_all(&self, entities: &[Self::Entity]) -> Result<usize> {
        self.generic().save_all(entities)
    }

    fn update(&self, id: &<Self::Entity as Entity>::Id, entity: &Self::Entity) -> Result<()> {
        self.generic().update(id, entity)
    }

    fn update_all(&self, items: &[(<Self::Entity as Entity>::Id, Self::Entity)]) -> Result<usize> {
        self.generic().update_all(items)
    }

    fn delete(&self, id: &<Self::Entity as Entity>::Id) -> Result<usize> {
        self.generic().delete(id)
    }

    fn delete_all(&self, ids: &[<Self::Entity as Entity>::Id]) -> Result<usize> {
        self.generic().delete_all(ids)
    }

    fn extract_id(&self, entity: &Self::Entity) -> <Self::Entity as Entity>::Id {
        self.generic().extract_id(entity)
    }
}

impl<E: Entity> Repository for GenericRepository<E> {
    type Entity = E;

    fn generic(&self) -> &GenericRepository<E> {
        self
    }
}
