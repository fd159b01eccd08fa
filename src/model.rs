use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use eyre::{Error, WrapErr};

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct StudentId(pub i32);

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ProjectId(pub i32);

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RoleId(pub i32);

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Student assignment state as stored by the management layer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    Available,
    Pending,
    Assigned,
}

impl Status {
    pub fn code(self) -> i32 {
        match self {
            Status::Available => 0,
            Status::Pending => 1,
            Status::Assigned => 2,
        }
    }
}

/// Coarse role category. Frontend and Backend developers share the
/// `Developer` type and are told apart by the role name.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RoleType {
    Fullstack,
    Developer,
    UiUxDesigner,
    ProductManager,
    Other,
}

impl RoleType {
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => RoleType::Fullstack,
            2 => RoleType::Developer,
            3 => RoleType::UiUxDesigner,
            4 => RoleType::ProductManager,
            _ => RoleType::Other,
        }
    }
}

/// A role definition. The role id is the uniqueness key within a team: a
/// team holds at most one member per role id.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Role {
    pub id: RoleId,
    pub kind: RoleType,
    pub name: String,
}

impl Role {
    pub fn is_frontend(&self) -> bool {
        self.kind == RoleType::Developer && self.name.contains("Frontend")
    }

    pub fn is_backend(&self) -> bool {
        self.kind == RoleType::Developer && self.name.contains("Backend")
    }
}

/// A student currently waiting for a team, with up to four ranked project
/// choices.
#[derive(Clone, Debug)]
pub struct PendingStudent {
    pub id: StudentId,
    pub is_admin: bool,
    pub pending_since: DateTime<Utc>,
    pub priorities: [Option<ProjectId>; 4],
}

impl PendingStudent {
    /// Ranked choices as (rank, project), most preferred first, rank
    /// starting at 1. Empty slots are skipped.
    pub fn preferences(&self) -> impl Iterator<Item = (u8, ProjectId)> + '_ {
        self.priorities
            .iter()
            .enumerate()
            .filter_map(|(idx, project)| project.map(|p| (idx as u8 + 1, p)))
    }
}

/// One (student, preferred project, active role) row considered during team
/// assembly.
#[derive(Clone, Debug)]
pub struct Candidate {
    pub student: StudentId,
    pub project: ProjectId,
    pub rank: u8,
    pub pending_since: DateTime<Utc>,
    pub is_admin: bool,
    pub role: Role,
}

#[derive(Clone, Debug)]
pub struct Project {
    pub id: ProjectId,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub criteria: BTreeSet<i32>,
}

/// A selected team for one project, one member per distinct role id.
#[derive(Clone, Debug)]
pub struct Team {
    pub project: ProjectId,
    pub members: Vec<Candidate>,
}

impl Team {
    pub fn student_ids(&self) -> Vec<StudentId> {
        self.members.iter().map(|m| m.student).collect()
    }
}

/// Parse the `CriteriaIds` storage column, a comma-separated list of integer
/// codes. `NULL` and the empty string mean no tags.
pub fn parse_criteria_ids(raw: Option<&str>) -> Result<BTreeSet<i32>, Error> {
    let mut ids = BTreeSet::new();
    let Some(raw) = raw else { return Ok(ids) };
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        ids.insert(
            part.parse()
                .wrap_err_with(|| format!("invalid criteria id {part:?}"))?,
        );
    }
    Ok(ids)
}

/// Render a criteria set back into the comma-separated storage form.
pub fn criteria_ids_csv(ids: &BTreeSet<i32>) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
