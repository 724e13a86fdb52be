//! Attachment descriptors per course

use super::contract::Repository;
use super::filter::{eq, gt, Filter, Page, Sort, SumBy};
use super::generic::GenericRepository;
use crate::errors::Result;
use crate::mapping::{FromColumn, ToColumn, Value};
use crate::pool::ConnectionPool;
use std::sync::Arc;
use tessera_core::Attachment;
use uuid::Uuid;

const USAGE_SQL: &str =
    "SELECT COUNT(*), COALESCE(SUM(size_bytes), 0) FROM attachments WHERE course_id = ?1";

/// Storage used by one course
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageUsage {
    pub files: u64,
    pub total_bytes: i64,
}

#[derive(Debug, Clone)]
pub struct AttachmentRepository {
    base: GenericRepository<Attachment>,
}

impl AttachmentRepository {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self {
            base: GenericRepository::new(pool),
        }
    }

    /// Oldest upload first
    pub fn find_by_course(&self, course_id: Uuid) -> Result<Vec<Attachment>> {
        self.base.find_all_by(
            Some(&eq("courseId", course_id)),
            Some(&Sort::asc("uploadedAt")),
            Page::all(),
        )
    }

    pub fn find_by_content_type(&self, content_type: &str) -> Result<Vec<Attachment>> {
        self.base.find_by_field("contentType", content_type)
    }

    /// Files above `bytes` in one course, largest first
    pub fn find_larger_than(&self, course_id: Uuid, bytes: i64, page: Page) -> Result<Vec<Attachment>> {
        let filter = eq("courseId", course_id).and(gt("sizeBytes", bytes));
        self.base
            .find_all_by(Some(&filter), Some(&Sort::desc("sizeBytes")), page)
    }

    pub fn usage_for_course(&self, course_id: Uuid) -> Result<StorageUsage> {
        let usage = self.base.with_connection(|conn| {
            self.base.query_map_in(
                conn,
                "usage_for_course",
                USAGE_SQL,
                &[course_id.to_column()],
                |row| {
                    Ok(StorageUsage {
                        files: row.get::<_, i64>(0)?.max(0) as u64,
                        total_bytes: row.get(1)?,
                    })
                },
            )
        })?;
        Ok(usage.into_iter().next().unwrap_or_default())
    }

    pub fn total_size_for_course(&self, course_id: Uuid) -> Result<i64> {
        Ok(self.usage_for_course(course_id)?.total_bytes)
    }

    /// Total bytes per course, for every course that has attachments
    pub fn total_size_by_course(&self) -> Result<Vec<(Uuid, i64)>> {
        let rows = self.base.group_by(&SumBy::new("courseId", "sizeBytes"), |row| {
            Ok((row.get::<_, Value>(0)?, row.get::<_, i64>(1)?))
        })?;
        rows.into_iter()
            .map(|(id, total)| {
                let id = Uuid::from_column(id).map_err(|e| {
                    crate::errors::mapping_error("attachments", format!("column course_id: {}", e))
                })?;
                Ok((id, total))
            })
            .collect()
    }
}

impl Repository for AttachmentRepository {
    type Entity = Attachment;

    fn generic(&self) -> &GenericRepository<Attachment> {
        &self.base
    }
}
