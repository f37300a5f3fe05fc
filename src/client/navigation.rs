//! Role-filtered application sections.
//!
//! Hides menu entries and guards client-side routes. The server still
//! authorizes every request; nothing here is a security boundary.

use crate::types::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavSection {
    pub id: &'static str,
    pub label: &'static str,
    pub icon: &'static str,
    pub roles: &'static [Role],
}

impl NavSection {
    pub fn allows(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

const EVERYONE: &[Role] = &[Role::Student, Role::Faculty, Role::Admin];
const STAFF: &[Role] = &[Role::Faculty, Role::Admin];

const STUDENT_ONLY: &[Role] = &[Role::Student];
const FACULTY_ONLY: &[Role] = &[Role::Faculty];
const ADMIN_ONLY: &[Role] = &[Role::Admin];

const fn section(
    id: &'static str,
    label: &'static str,
    icon: &'static str,
    roles: &'static [Role],
) -> NavSection {
    NavSection {
        id,
        label,
        icon,
        roles,
    }
}

/// Menu order.
pub const SECTIONS: &[NavSection] = &[
    section("dashboard", "Dashboard", "home", EVERYONE),
    section("mark-attendance", "Mark Attendance", "camera", STUDENT_ONLY),
    section("my-attendance", "My Attendance", "calendar", STUDENT_ONLY),
    section("face-enrollment", "Face Enrollment", "user-check", STUDENT_ONLY),
    section("classes", "Classes", "book-open", STAFF),
    section("qr-codes", "QR Codes", "qr-code", FACULTY_ONLY),
    section("students", "Students", "users", STAFF),
    section("faculty", "Faculty", "briefcase", ADMIN_ONLY),
    section("analytics", "Analytics", "bar-chart", STAFF),
    section("reports", "Reports", "file-text", STAFF),
    section("settings", "Settings", "settings", EVERYONE),
];

/// Sections `role` may see, in menu order.
pub fn visible_sections(role: Role) -> Vec<&'static NavSection> {
    SECTIONS.iter().filter(|s| s.allows(role)).collect()
}

/// Route guard. Unknown section ids are denied.
pub fn can_access(role: Role, id: &str) -> bool {
    SECTIONS.iter().any(|s| s.id == id && s.allows(role))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(role: Role) -> Vec<&'static str> {
        visible_sections(role).into_iter().map(|s| s.id).collect()
    }

    #[test]
    fn student_menu_keeps_table_order() {
        assert_eq!(
            ids(Role::Student),
            ["dashboard", "mark-attendance", "my-attendance", "face-enrollment", "settings"]
        );
    }

    #[test]
    fn admin_sees_directory_but_not_student_tools() {
        let admin = ids(Role::Admin);
        assert!(admin.contains(&"faculty"));
        assert!(!admin.contains(&"mark-attendance"));
        assert!(!admin.contains(&"qr-codes"));
    }

    #[test]
    fn guard_matches_menu() {
        for role in Role::ALL {
            for section in SECTIONS {
                assert_eq!(can_access(role, section.id), section.allows(role));
            }
        }
        assert!(!can_access(Role::Admin, "billing"));
    }

    #[test]
    fn ids_are_unique() {
        let mut seen = std::collections::HashSet::new();
        assert!(SECTIONS.iter().all(|s| seen.insert(s.id)));
    }
}
