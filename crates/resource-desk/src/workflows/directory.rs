use std::fmt;

use serde::{Deserialize, Serialize};

use super::repository::{RepositoryError, UserDirectory};

/// Placeholder rendered wherever a related record is missing.
pub const NOT_STATED: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Roles that unlock officer actions. Ordinary applicants carry no role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    ItAdmin,
    BpmStaff,
    Hod,
    Approver,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Admin => "Administrator",
            Self::ItAdmin => "IT Administrator",
            Self::BpmStaff => "BPM Staff",
            Self::Hod => "Head of Department",
            Self::Approver => "Approver",
        }
    }
}

/// Staff member as known to the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub grade: Option<u16>,
    #[serde(default)]
    pub roles: Vec<Role>,
}

impl User {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    pub fn grade_at_least(&self, minimum: u16) -> bool {
        self.grade.is_some_and(|grade| grade >= minimum)
    }

    pub fn shares_department_with(&self, other: &User) -> bool {
        matches!((&self.department, &other.department), (Some(a), Some(b)) if a == b)
    }
}

pub fn display_name(user: Option<&User>) -> &str {
    user.map(|user| user.name.as_str()).unwrap_or(NOT_STATED)
}

pub fn label_or_placeholder(value: Option<&str>) -> &str {
    match value {
        Some(value) if !value.trim().is_empty() => value,
        _ => NOT_STATED,
    }
}

/// Staff holding any of `roles`, in directory order.
pub(crate) fn staff_with_roles<D>(directory: &D, roles: &[Role]) -> Result<Vec<User>, RepositoryError>
where
    D: UserDirectory + ?Sized,
{
    Ok(directory
        .users()?
        .into_iter()
        .filter(|user| roles.iter().any(|role| user.has_role(*role)))
        .collect())
}
