use std::collections::HashMap;

use eyre::Error;
use tracing::{debug, instrument};

use crate::loader::Loader;
use crate::model::{Candidate, PendingStudent, Role, StudentId};

/// Load pending students and their active roles, then expand them into
/// candidate rows. Read-only.
#[instrument(skip_all)]
pub async fn collect<L: Loader>(loader: &mut L) -> Result<Vec<Candidate>, Error> {
    let students = loader.load_pending_students().await?;
    let roles = loader.load_active_roles().await?;
    debug!(
        "Collected {} pending students, {} with an active role",
        students.len(),
        students.iter().filter(|s| roles.contains_key(&s.id)).count()
    );
    Ok(expand(&students, &roles))
}

/// One candidate row per (student, ranked project, active role). Students
/// without an active role cannot fill a role slot and are skipped. Rows come
/// back sorted by priority rank, then by how long the student has been
/// waiting, with the student id breaking exact ties so the order never
/// depends on storage row order.
pub fn expand(students: &[PendingStudent], roles: &HashMap<StudentId, Role>) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    for student in students {
        let Some(role) = roles.get(&student.id) else {
            continue;
        };
        for (rank, project) in student.preferences() {
            candidates.push(Candidate {
                student: student.id,
                project,
                rank,
                pending_since: student.pending_since,
                is_admin: student.is_admin,
                role: role.clone(),
            });
        }
    }
    candidates.sort_by_key(|c| (c.rank, c.pending_since, c.student));
    candidates
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::*;
    use crate::model::{ProjectId, RoleId, RoleType};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    fn role(id: i32) -> Role {
        Role {
            id: RoleId(id),
            kind: RoleType::Developer,
            name: "Backend Developer".into(),
        }
    }

    fn student(id: i32, waited_hours: i64, priorities: [Option<i32>; 4]) -> PendingStudent {
        PendingStudent {
            id: StudentId(id),
            is_admin: false,
            pending_since: base() - Duration::hours(waited_hours),
            priorities: priorities.map(|p| p.map(ProjectId)),
        }
    }

    #[test]
    fn students_without_active_role_are_excluded() {
        let students = vec![
            student(1, 5, [Some(10), None, None, None]),
            student(2, 5, [Some(10), None, None, None]),
        ];
        let mut roles = HashMap::new();
        roles.insert(StudentId(1), role(3));
        let candidates = expand(&students, &roles);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].student, StudentId(1));
    }

    #[test]
    fn one_row_per_ranked_preference() {
        let students = vec![student(1, 5, [Some(10), Some(11), None, Some(13)])];
        let mut roles = HashMap::new();
        roles.insert(StudentId(1), role(3));
        let candidates = expand(&students, &roles);
        let ranked: Vec<_> = candidates.iter().map(|c| (c.rank, c.project)).collect();
        assert_eq!(
            ranked,
            vec![
                (1, ProjectId(10)),
                (2, ProjectId(11)),
                (4, ProjectId(13)),
            ]
        );
    }

    #[test]
    fn rows_sorted_by_rank_then_longest_wait() {
        let students = vec![
            student(1, 2, [Some(10), None, None, None]),
            student(2, 50, [None, Some(10), None, None]),
            student(3, 20, [Some(11), None, None, None]),
        ];
        let mut roles = HashMap::new();
        roles.insert(StudentId(1), role(3));
        roles.insert(StudentId(2), role(4));
        roles.insert(StudentId(3), role(5));
        let candidates = expand(&students, &roles);
        let order: Vec<_> = candidates.iter().map(|c| c.student).collect();
        // Rank 1 rows first, longest-waiting student winning inside the tier,
        // then the rank 2 row.
        assert_eq!(order, vec![StudentId(3), StudentId(1), StudentId(2)]);
    }

    #[test]
    fn ties_on_rank_and_wait_fall_back_to_student_id() {
        // Same rank, same pending timestamp, listed in reverse id order.
        let students = vec![
            student(9, 5, [Some(10), None, None, None]),
            student(4, 5, [Some(10), None, None, None]),
        ];
        let mut roles = HashMap::new();
        roles.insert(StudentId(9), role(3));
        roles.insert(StudentId(4), role(4));
        let candidates = expand(&students, &roles);
        let order: Vec<_> = candidates.iter().map(|c| c.student).collect();
        assert_eq!(order, vec![StudentId(4), StudentId(9)]);
    }
}
