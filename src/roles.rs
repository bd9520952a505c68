use crate::error::PresenceError;
use serde::Serialize;

/// A user's capacity: inside a course (guest, student, non-editing teacher,
/// teacher) or system-wide (admin). `Unknown` stands for "any role" in
/// queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Unknown,
    Guest,
    Student,
    NonEditingTeacher,
    Teacher,
    SysAdmin,
}

impl Role {
    /// Order used when summing every role into a platform-wide total.
    pub const SUM_ORDER: [Role; 5] = [
        Role::Guest,
        Role::Student,
        Role::NonEditingTeacher,
        Role::Teacher,
        Role::SysAdmin,
    ];

    /// Order in which role batches consume the display quota.
    pub const LISTING_ORDER: [Role; 3] = [Role::Teacher, Role::NonEditingTeacher, Role::Student];

    pub fn parse(s: &str) -> Result<Self, PresenceError> {
        match s {
            "unknown" => Ok(Self::Unknown),
            "guest" => Ok(Self::Guest),
            "student" => Ok(Self::Student),
            "nonEditingTeacher" => Ok(Self::NonEditingTeacher),
            "teacher" => Ok(Self::Teacher),
            "sysAdmin" => Ok(Self::SysAdmin),
            other => Err(PresenceError::InvalidRole(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Guest => "guest",
            Self::Student => "student",
            Self::NonEditingTeacher => "nonEditingTeacher",
            Self::Teacher => "teacher",
            Self::SysAdmin => "sysAdmin",
        }
    }

    /// Roles that exist as a course enrolment.
    pub fn is_course_role(self) -> bool {
        matches!(
            self,
            Self::Student | Self::NonEditingTeacher | Self::Teacher
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Sex {
    Unknown,
    Female,
    Male,
}

impl Sex {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unknown" => Some(Self::Unknown),
            "female" => Some(Self::Female),
            "male" => Some(Self::Male),
            _ => None,
        }
    }

    /// Stored values that no longer parse are shown as unknown.
    pub fn from_stored(s: &str) -> Self {
        Self::parse(s).unwrap_or(Self::Unknown)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Female => "female",
            Self::Male => "male",
        }
    }
}
