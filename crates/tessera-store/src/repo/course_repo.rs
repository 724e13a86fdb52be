//! Course queries and course membership

use super::contract::Repository;
use super::filter::{eq, CountBy, Page, Sort};
use super::generic::GenericRepository;
use crate::errors::{invalid_input, mapping_error, Result};
use crate::mapping::{Entity, ToColumn};
use crate::pool::ConnectionPool;
use chrono::Utc;
use std::sync::Arc;
use tessera_core::{Course, CourseStatus};
use uuid::Uuid;

const ADD_MEMBER_SQL: &str =
    "INSERT OR IGNORE INTO course_members (course_id, user_id, joined_at) VALUES (?1, ?2, ?3)";
const REMOVE_MEMBER_SQL: &str = "DELETE FROM course_members WHERE course_id = ?1 AND user_id = ?2";
const CLEAR_MEMBERS_SQL: &str = "DELETE FROM course_members WHERE course_id = ?1";
const MEMBER_COUNT_SQL: &str = "SELECT COUNT(*) FROM course_members WHERE course_id = ?1";

#[derive(Debug, Clone)]
pub struct CourseRepository {
    base: GenericRepository<Course>,
}

impl CourseRepository {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self {
            base: GenericRepository::new(pool),
        }
    }

    pub fn find_by_owner(&self, owner_id: Uuid) -> Result<Vec<Course>> {
        self.base.find_by_field("ownerId", owner_id)
    }

    /// Courses in `status`, newest first
    pub fn find_by_status(&self, status: CourseStatus, page: Page) -> Result<Vec<Course>> {
        self.base
            .find_all_by(Some(&eq("status", status)), Some(&Sort::desc("createdAt")), page)
    }

    /// Courses the user is enrolled in, by title
    pub fn find_for_member(&self, user_id: Uuid) -> Result<Vec<Course>> {
        let base_query = format!(
            "{} JOIN course_members m ON m.course_id = c.id",
            GenericRepository::<Course>::select_sql_as("c")
        );
        self.base.find_all_from(
            &base_query,
            Some(&eq("m.userId", user_id)),
            Some(&Sort::asc("c.title")),
            Page::all(),
        )
    }

    /// Enroll a user; returns false when already enrolled
    pub fn add_member(&self, course_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.base.with_connection(|conn| {
            let inserted = self.base.execute_in(
                conn,
                "add_member",
                ADD_MEMBER_SQL,
                &[course_id.to_column(), user_id.to_column(), Utc::now().to_column()],
            )?;
            Ok(inserted > 0)
        })
    }

    /// Returns false when the user was not enrolled
    pub fn remove_member(&self, course_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.base.with_connection(|conn| {
            let removed = self.base.execute_in(
                conn,
                "remove_member",
                REMOVE_MEMBER_SQL,
                &[course_id.to_column(), user_id.to_column()],
            )?;
            Ok(removed > 0)
        })
    }

    pub fn clear_members(&self, course_id: Uuid) -> Result<usize> {
        self.base.with_connection(|conn| {
            self.base
                .execute_in(conn, "clear_members", CLEAR_MEMBERS_SQL, &[course_id.to_column()])
        })
    }

    pub fn member_count(&self, course_id: Uuid) -> Result<u64> {
        let counts = self.base.with_connection(|conn| {
            self.base.query_map_in(
                conn,
                "member_count",
                MEMBER_COUNT_SQL,
                &[course_id.to_column()],
                |row| row.get::<_, i64>(0),
            )
        })?;
        Ok(counts.first().copied().unwrap_or(0).max(0) as u64)
    }

    /// Whether another member fits; capacity 0 means unlimited
    ///
    /// A negative capacity is `InvalidInput`.
    pub fn has_free_seat(&self, course: &Course) -> Result<bool> {
        let seats = u64::try_from(course.capacity).map_err(|_| {
            invalid_input(
                "has_free_seat",
                format!("capacity {} is negative", course.capacity),
            )
            .with_table(Course::table_name())
            .with_entity_id(course.id.to_string())
        })?;
        if seats == 0 {
            return Ok(true);
        }
        Ok(self.member_count(course.id)? < seats)
    }

    pub fn count_by_status(&self) -> Result<Vec<(CourseStatus, u64)>> {
        let rows = self.base.group_by(&CountBy::new("status"), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        rows.into_iter()
            .map(|(name, total)| {
                let status = name
                    .parse::<CourseStatus>()
                    .map_err(|e| mapping_error(Course::table_name(), e.to_string()))?;
                Ok((status, total.max(0) as u64))
            })
            .collect()
    }
}

impl Repository for CourseRepository {
    type Entity = Course;

    fn generic(&self) -> &GenericRepository<Course> {
        &self.base
    }
}
