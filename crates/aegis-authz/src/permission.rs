//! Hierarchical permission matching.
//!
//! Permissions are colon-delimited segment paths, most general first, e.g.
//! `"billing:invoices:read"`. A held permission covers a required one when
//! it is an exact match or a segment-wise prefix of it: holding
//! `"billing:invoices"` covers `"billing:invoices:read"`, but
//! `"billing:invoices:read"` does not cover `"billing:invoices"`. The match
//! is prefix-by-segment, never substring.

use std::collections::HashSet;

pub const SYSTEM_ROOT_SCOPE: &str = "system";

fn segments(permission: &str) -> Vec<&str> {
    permission.split(':').filter(|s| !s.is_empty()).collect()
}

/// Does the `held` scope cover the `required` one? The literal scope
/// `system` covers every required permission unconditionally, including
/// empty.
pub fn has_sufficient_permission(held: &str, required: &str) -> bool {
    if held == SYSTEM_ROOT_SCOPE {
        return true;
    }
    let held_segments = segments(held);
    let required_segments = segments(required);
    if held_segments.len() > required_segments.len() {
        return false;
    }
    held_segments
        .iter()
        .zip(required_segments.iter())
        .all(|(h, r)| h == r)
}

/// True iff the literal `system` scope is in `held`.
pub fn has_system_permission(held: &HashSet<String>) -> bool {
    held.contains(SYSTEM_ROOT_SCOPE)
}

/// Does any permission in `held` cover `required`? The authorization
/// service tests the whole permission set rather than a single scope.
pub fn any_permission_sufficient(held: &HashSet<String>, required: &str) -> bool {
    held.iter().any(|h| has_sufficient_permission(h, required))
}

/// Maps a named action to its canonical required scope. Unknown actions
/// resolve to `system`, which makes them admin-only by default rather than
/// silently open.
pub fn resolve_action_permission(action: &str) -> &'static str {
    match action {
        "CreateOU" | "ReadOU" | "UpdateOU" | "DeleteOU" | "ListOUs" => "system:ou",
        "ReadUserSchema" | "ListUserSchemas" => "system:userschema:view",
        "CreateUserSchema" | "UpdateUserSchema" | "DeleteUserSchema" => "system:userschema:manage",
        "CreateUser" | "ReadUser" | "UpdateUser" | "DeleteUser" | "ListUsers" => "system:user",
        _ => SYSTEM_ROOT_SCOPE,
    }
}

/// Actions whose read visibility extends from an OU to its descendants.
pub const INHERITANCE_ELIGIBLE_ACTIONS: &[&str] = &["ReadUserSchema", "ListUserSchemas"];

pub fn is_inheritance_eligible(action: &str) -> bool {
    INHERITANCE_ELIGIBLE_ACTIONS.contains(&action)
}
