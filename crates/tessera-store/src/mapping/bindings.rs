//! Table bindings for the domain records
//!
//! Field names are the logical camelCase names; columns are derived from
//! them (`passwordHash` → `password_hash`).

use chrono::{DateTime, Utc};
use tessera_core::{Attachment, Course, CourseStatus, Role, Tag, User};
use uuid::Uuid;

crate::impl_entity! {
    User => "users" {
        id: Uuid,
        username: String,
        email: String,
        password_hash: String as "passwordHash",
        role: Role,
        email_verified: bool as "emailVerified",
        created_at: DateTime<Utc> as "createdAt",
    }
}

crate::impl_entity! {
    Course => "courses" {
        id: Uuid,
        title: String,
        description: Option<String>,
        owner_id: Uuid as "ownerId",
        status: CourseStatus,
        capacity: i64,
        created_at: DateTime<Utc> as "createdAt",
    }
}

crate::impl_entity! {
    Tag => "tags" {
        id: i64,
        name: String,
    }
}

crate::impl_entity! {
    Attachment => "attachments" {
        id: Uuid,
        course_id: Uuid as "courseId",
        file_name: String as "fileName",
        content_type: String as "contentType",
        size_bytes: i64 as "sizeBytes",
        uploaded_at: DateTime<Utc> as "uploadedAt",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{map_row, Entity, Value};
    use rusqlite::Connection;
    use tessera_core::ExErrorKind;

    #[test]
    fn test_columns_derive_from_field_names() {
        assert_eq!(User::field_names()[0], "id");
        assert_eq!(
            User::column_names(),
            vec![
                "id",
                "username",
                "email",
                "password_hash",
                "role",
                "email_verified",
                "created_at"
            ]
        );
        assert_eq!(Attachment::column_names()[1], "course_id");
        assert_eq!(Tag::table_name(), "tags");
    }

    #[test]
    fn test_values_follow_field_order() {
        let user = User::new("ada", "ada@example.com", "h", Role::Admin).unwrap();
        let values = user.values();
        assert_eq!(values.len(), User::field_names().len());
        assert_eq!(values[0], Value::Text(user.id.to_string()));
        assert_eq!(values[4], Value::Text("ADMIN".into()));
        assert_eq!(values[5], Value::Integer(0));
    }

    #[test]
    fn test_map_row_reads_by_column_name() {
        let conn = Connection::open_in_memory().unwrap();
        // column order deliberately differs from field order
        let course: Course = conn
            .query_row(
                "SELECT 'draft' AS status, 12 AS capacity, NULL AS description, \
                 '2024-01-02 03:04:05' AS created_at, 'Rust' AS title, \
                 '6f1c1d9e-3b8a-4a55-9d0e-2c1f8f6a7b01' AS owner_id, \
                 '0b7e5a1c-4d2f-4e8a-8c3b-1a2b3c4d5e6f' AS id",
                [],
                |row| Ok(map_row::<Course>(row)),
            )
            .unwrap()
            .unwrap();

        assert_eq!(course.title, "Rust");
        assert_eq!(course.status, CourseStatus::Draft);
        assert_eq!(course.capacity, 12);
        assert_eq!(course.description, None);
    }

    #[test]
    fn test_map_row_failure_names_table_and_column() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn
            .query_row("SELECT 'x' AS id, 'oops' AS name", [], |row| {
                Ok(map_row::<Tag>(row))
            })
            .unwrap()
            .unwrap_err();

        assert_eq!(err.kind(), ExErrorKind::Mapping);
        assert_eq!(err.table(), Some("tags"));
        assert!(err.message().contains("column id"));
    }

    #[test]
    fn test_map_row_missing_column() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn
            .query_row("SELECT 1 AS id", [], |row| Ok(map_row::<Tag>(row)))
            .unwrap()
            .unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::Mapping);
        assert!(err.message().contains("name"));
    }
}
