//! Tags and the course ↔ tag relationship

use super::contract::Repository;
use super::filter::{Page, Sort};
use super::generic::GenericRepository;
use crate::errors::Result;
use crate::mapping::ToColumn;
use crate::pool::ConnectionPool;
use std::sync::Arc;
use tessera_core::Tag;
use uuid::Uuid;

const ATTACH_SQL: &str = "INSERT OR IGNORE INTO course_tags (course_id, tag_id) VALUES (?1, ?2)";
const DETACH_SQL: &str = "DELETE FROM course_tags WHERE course_id = ?1 AND tag_id = ?2";
const CLEAR_SQL: &str = "DELETE FROM course_tags WHERE course_id = ?1";
const NEXT_ID_SQL: &str = "SELECT COALESCE(MAX(id), 0) + 1 FROM tags";

#[derive(Debug, Clone)]
pub struct TagRepository {
    base: GenericRepository<Tag>,
}

impl TagRepository {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self {
            base: GenericRepository::new(pool),
        }
    }

    pub fn find_by_name(&self, name: &str) -> Result<Option<Tag>> {
        Ok(self.base.find_by_field("name", name)?.into_iter().next())
    }

    /// Tags attached to a course, by name
    pub fn find_for_course(&self, course_id: Uuid) -> Result<Vec<Tag>> {
        let base_query = format!(
            "{} JOIN course_tags ct ON ct.tag_id = t.id",
            GenericRepository::<Tag>::select_sql_as("t")
        );
        let on_course = super::filter::eq("ct.courseId", course_id);
        self.base
            .find_all_from(&base_query, Some(&on_course), Some(&Sort::asc("t.name")), Page::all())
    }

    /// Smallest id above every stored tag
    pub fn next_id(&self) -> Result<i64> {
        let ids = self.base.with_connection(|conn| {
            self.base
                .query_map_in(conn, "next_id", NEXT_ID_SQL, &[], |row| row.get::<_, i64>(0))
        })?;
        Ok(ids.first().copied().unwrap_or(1))
    }

    /// Returns false when the tag was already attached
    pub fn attach_to_course(&self, course_id: Uuid, tag_id: i64) -> Result<bool> {
        self.base.with_connection(|conn| {
            let inserted = self.base.execute_in(
                conn,
                "attach_tag",
                ATTACH_SQL,
                &[course_id.to_column(), tag_id.to_column()],
            )?;
            Ok(inserted > 0)
        })
    }

    pub fn detach_from_course(&self, course_id: Uuid, tag_id: i64) -> Result<bool> {
        self.base.with_connection(|conn| {
            let removed = self.base.execute_in(
                conn,
                "detach_tag",
                DETACH_SQL,
                &[course_id.to_column(), tag_id.to_column()],
            )?;
            Ok(removed > 0)
        })
    }

    pub fn clear_course_tags(&self, course_id: Uuid) -> Result<usize> {
        self.base.with_connection(|conn| {
            self.base
                .execute_in(conn, "clear_course_tags", CLEAR_SQL, &[course_id.to_column()])
        })
    }
}

impl Repository for TagRepository {
    type Entity = Tag;

    fn generic(&self) -> &GenericRepository<Tag> {
        &self.base
    }
}
