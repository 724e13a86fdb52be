//! Field → column name transform

/// Lowercase a field name, inserting `_` at case boundaries
///
/// `createdAt` → `created_at`, `HTTPStatus` → `http_status`. Names that are
/// already snake_case come back unchanged, so the transform is idempotent on
/// its own output. Qualifiers survive: `m.userId` → `m.user_id`.
pub fn to_column_name(field: &str) -> String {
    let chars: Vec<char> = field.chars().collect();
    let mut column = String::with_capacity(field.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_ascii_uppercase() {
            column.push(c);
            continue;
        }
        let prev = if i > 0 { Some(chars[i - 1]) } else { None };
        let next = chars.get(i + 1).copied();
        let boundary = match prev {
            Some(p) if p.is_ascii_lowercase() || p.is_ascii_digit() => true,
            // end of an acronym: the `S` in `HTTPStatus`
            Some(p) if p.is_ascii_uppercase() => next.is_some_and(|n| n.is_ascii_lowercase()),
            _ => false,
        };
        if boundary && !column.ends_with('_') {
            column.push('_');
        }
        column.push(c.to_ascii_lowercase());
    }

    column
}

/// Whether `name` is safe to splice into SQL as an identifier
///
/// Letters, digits, `_` and `.` (for `alias.column`), not starting with a digit.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}
