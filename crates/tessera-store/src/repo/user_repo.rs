//! User queries beyond CRUD

use super::contract::Repository;
use super::filter::{contains, eq, CountBy, Filter, Page, Sort};
use super::generic::GenericRepository;
use crate::errors::{mapping_error, Result};
use crate::mapping::{Entity, ToColumn};
use crate::pool::ConnectionPool;
use std::sync::Arc;
use tessera_core::{Role, User};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct UserRepository {
    base: GenericRepository<User>,
}

impl UserRepository {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self {
            base: GenericRepository::new(pool),
        }
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.base.find_by_field("email", email)?.into_iter().next())
    }

    pub fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self.base.find_by_field("username", username)?.into_iter().next())
    }

    pub fn find_by_role(&self, role: Role) -> Result<Vec<User>> {
        self.base.find_by_field("role", role)
    }

    /// Accounts still waiting on email verification, oldest first
    pub fn find_unverified(&self, page: Page) -> Result<Vec<User>> {
        self.base.find_all_by(
            Some(&eq("emailVerified", false)),
            Some(&Sort::asc("createdAt")),
            page,
        )
    }

    /// Usernames containing `fragment`; `%` and `_` match literally
    pub fn search_by_username(&self, fragment: &str, page: Page) -> Result<Vec<User>> {
        self.base.find_all_by(
            Some(&contains("username", fragment)),
            Some(&Sort::asc("username")),
            page,
        )
    }

    /// Members of a course, in join order
    pub fn find_members_of(&self, course_id: Uuid) -> Result<Vec<User>> {
        let base_query = format!(
            "{} JOIN course_members m ON m.user_id = u.id",
            GenericRepository::<User>::select_sql_as("u")
        );
        let member_of = eq("m.courseId", course_id);
        self.base.find_all_from(
            &base_query,
            Some(&member_of),
            Some(&Sort::asc("m.joinedAt")),
            Page::all(),
        )
    }

    /// Same as `find_members_of` restricted to one role
    pub fn find_members_with_role(&self, course_id: Uuid, role: Role) -> Result<Vec<User>> {
        let base_query = format!(
            "{} JOIN course_members m ON m.user_id = u.id",
            GenericRepository::<User>::select_sql_as("u")
        );
        let filter = eq("m.courseId", course_id).and(eq("u.role", role));
        self.base
            .find_all_from(&base_query, Some(&filter), Some(&Sort::asc("u.username")), Page::all())
    }

    /// Number of accounts per role; roles with no accounts are omitted
    pub fn count_by_role(&self) -> Result<Vec<(Role, u64)>> {
        let rows = self.base.group_by(&CountBy::new("role"), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        rows.into_iter()
            .map(|(name, total)| {
                let role = name
                    .parse::<Role>()
                    .map_err(|e| mapping_error(User::table_name(), e.to_string()))?;
                Ok((role, total.max(0) as u64))
            })
            .collect()
    }

    /// Flip the verification flag without rewriting the whole row
    pub fn mark_verified(&self, id: Uuid) -> Result<bool> {
        self.base.with_connection(|conn| {
            let changed = self.base.execute_in(
                conn,
                "mark_verified",
                "UPDATE users SET email_verified = 1 WHERE id = ?1",
                &[id.to_column()],
            )?;
            Ok(changed > 0)
        })
    }
}

impl Repository for UserRepository {
    type Entity = User;

    fn generic(&self) -> &GenericRepository<User> {
        &self.base
    }
}
