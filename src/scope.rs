use crate::error::PresenceError;
use crate::roles::Role;
use rusqlite::types::Value;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum HierarchyLevel {
    System,
    Country,
    Institution,
    Centre,
    Degree,
    Course,
}

impl HierarchyLevel {
    pub fn parse(s: &str) -> Result<Self, PresenceError> {
        match s {
            "system" => Ok(Self::System),
            "country" => Ok(Self::Country),
            "institution" => Ok(Self::Institution),
            "centre" => Ok(Self::Centre),
            "degree" => Ok(Self::Degree),
            "course" => Ok(Self::Course),
            other => Err(PresenceError::InvalidScope(format!(
                "unknown hierarchy level: {}",
                other
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Country => "country",
            Self::Institution => "institution",
            Self::Centre => "centre",
            Self::Degree => "degree",
            Self::Course => "course",
        }
    }

    /// Table storing the nodes of this level.
    pub fn table(self) -> Option<&'static str> {
        match self {
            Self::System => None,
            Self::Country => Some("countries"),
            Self::Institution => Some("institutions"),
            Self::Centre => Some("centres"),
            Self::Degree => Some("degrees"),
            Self::Course => Some("courses"),
        }
    }

    /// Column referencing the containing node, if this level has a parent row.
    pub fn parent_column(self) -> Option<&'static str> {
        match self {
            Self::System | Self::Country => None,
            Self::Institution => Some("country_id"),
            Self::Centre => Some("institution_id"),
            Self::Degree => Some("centre_id"),
            Self::Course => Some("degree_id"),
        }
    }
}

/// Currently selected hierarchy node. Non-system levels always carry a node id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeSelector {
    pub level: HierarchyLevel,
    pub node_id: Option<i64>,
}

impl ScopeSelector {
    pub fn system() -> Self {
        Self {
            level: HierarchyLevel::System,
            node_id: None,
        }
    }

    pub fn new(level: HierarchyLevel, node_id: Option<i64>) -> Result<Self, PresenceError> {
        if level == HierarchyLevel::System {
            return Ok(Self::system());
        }
        match node_id {
            Some(id) => Ok(Self {
                level,
                node_id: Some(id),
            }),
            None => Err(PresenceError::InvalidScope(format!(
                "{} scope requires a node id",
                level.as_str()
            ))),
        }
    }

    /// The course whose members get highlighted, when the scope is a course.
    pub fn current_course(&self) -> Option<i64> {
        match self.level {
            HierarchyLevel::Course => self.node_id,
            _ => None,
        }
    }
}

// Containment chain walked upwards from an enrolment (`cu`) to the country.
const CONTAINMENT_JOINS: [&str; 4] = [
    "JOIN courses crs ON crs.id = cu.course_id",
    "JOIN degrees deg ON deg.id = crs.degree_id",
    "JOIN centres ctr ON ctr.id = deg.centre_id",
    "JOIN institutions ins ON ins.id = ctr.institution_id",
];

/// Restriction of connected users to those enrolled under one hierarchy node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipFilter {
    joins: Vec<&'static str>,
    predicate: Option<(&'static str, i64)>,
}

impl MembershipFilter {
    pub fn unfiltered() -> Self {
        Self {
            joins: Vec::new(),
            predicate: None,
        }
    }

    pub fn is_unfiltered(&self) -> bool {
        self.predicate.is_none()
    }
}

pub fn resolve_predicate(scope: &ScopeSelector) -> Result<MembershipFilter, PresenceError> {
    let (depth, column) = match scope.level {
        HierarchyLevel::System => return Ok(MembershipFilter::unfiltered()),
        HierarchyLevel::Course => (0, "cu.course_id"),
        HierarchyLevel::Degree => (1, "crs.degree_id"),
        HierarchyLevel::Centre => (2, "deg.centre_id"),
        HierarchyLevel::Institution => (3, "ctr.institution_id"),
        HierarchyLevel::Country => (4, "ins.country_id"),
    };
    let Some(node_id) = scope.node_id else {
        return Err(PresenceError::InvalidScope(format!(
            "{} scope requires a node id",
            scope.level.as_str()
        )));
    };
    Ok(MembershipFilter {
        joins: CONTAINMENT_JOINS[..depth].to_vec(),
        predicate: Some((column, node_id)),
    })
}

/// `FROM connected c ... WHERE ...` for one (scope, role) pair. The
/// connection table is always aliased `c`.
#[derive(Debug, Clone)]
pub struct ScopedQuery {
    joins: Vec<String>,
    conditions: Vec<String>,
    params: Vec<Value>,
}

impl ScopedQuery {
    pub fn compose(filter: &MembershipFilter, role: Role) -> Self {
        let mut q = Self {
            joins: Vec::new(),
            conditions: Vec::new(),
            params: Vec::new(),
        };
        match role {
            // Guests and admins ignore the scope.
            Role::Guest => q
                .conditions
                .push("c.user_id NOT IN (SELECT user_id FROM course_users)".to_string()),
            Role::SysAdmin => q
                .joins
                .push("JOIN admins adm ON adm.user_id = c.user_id".to_string()),
            Role::Unknown if filter.is_unfiltered() => {}
            Role::Unknown | Role::Student | Role::NonEditingTeacher | Role::Teacher => {
                q.joins
                    .push("JOIN course_users cu ON cu.user_id = c.user_id".to_string());
                q.joins.extend(filter.joins.iter().map(|j| j.to_string()));
                if let Some((column, node_id)) = filter.predicate {
                    q.conditions.push(format!("{} = ?", column));
                    q.params.push(Value::Integer(node_id));
                }
                if role.is_course_role() {
                    q.conditions.push("cu.role = ?".to_string());
                    q.params.push(Value::Text(role.as_str().to_string()));
                }
            }
        }
        q
    }

    pub fn for_scope(scope: &ScopeSelector, role: Role) -> Result<Self, PresenceError> {
        let filter = resolve_predicate(scope)?;
        Ok(Self::compose(&filter, role))
    }

    /// Adds a join evaluated before the membership joins.
    pub fn with_leading_join(mut self, join: &str) -> Self {
        self.joins.insert(0, join.to_string());
        self
    }

    pub fn sql(&self, select: &str, order_by: Option<&str>) -> String {
        let mut sql = format!("SELECT {} FROM connected c", select);
        for j in &self.joins {
            sql.push(' ');
            sql.push_str(j);
        }
        if !self.conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.conditions.join(" AND "));
        }
        if let Some(order) = order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order);
        }
        sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }
}
