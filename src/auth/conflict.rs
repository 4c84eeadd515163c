/// Which unique column a rejected write collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    EmailConflict,
    PhoneConflict,
    GenericConflict,
}

/// Classify the unique columns reported by a failed write.
///
/// Email is checked first, so a write that collides on both email and phone
/// reports `EmailConflict`.
pub fn classify_conflict<S: AsRef<str>>(violated_fields: &[S]) -> ConflictKind {
    let has = |name: &str| violated_fields.iter().any(|f| f.as_ref() == name);

    if has("email") {
        ConflictKind::EmailConflict
    } else if has("phone") {
        ConflictKind::PhoneConflict
    } else {
        ConflictKind::GenericConflict
    }
}

/// Map a Postgres unique constraint name (e.g. `users_email_key`) to the
/// column it guards.
pub fn field_from_constraint(constraint: &str) -> Option<&'static str> {
    if constraint.contains("email") {
        Some("email")
    } else if constraint.contains("phone") {
        Some("phone")
    } else {
        None
    }
}
