use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use eyre::{Error, WrapErr};
use sqlx::Row;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};

use crate::model::{
    PendingStudent, Project, ProjectId, Role, RoleId, RoleType, Status, StudentId,
    criteria_ids_csv, parse_criteria_ids,
};

/// Storage boundary. The schema belongs to the management application; this
/// side only reads candidate data and issues targeted updates.
#[allow(async_fn_in_trait)]
pub trait Loader {
    /// Reset every student pending since before `cutoff` back to Available,
    /// clearing the assigned project and all four preference ranks. Returns
    /// the number of students released.
    async fn expire_pending(
        &mut self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64, Error>;

    async fn load_projects(&mut self) -> Result<Vec<Project>, Error>;

    async fn save_criteria(
        &mut self,
        project: ProjectId,
        criteria: &BTreeSet<i32>,
    ) -> Result<(), Error>;

    async fn load_pending_students(&mut self) -> Result<Vec<PendingStudent>, Error>;

    /// Active role per student. A student with several active assignments
    /// keeps the first in (student, role) order.
    async fn load_active_roles(&mut self) -> Result<HashMap<StudentId, Role>, Error>;

    /// Mark the team's students Assigned to `project`, all in one
    /// transaction.
    async fn reserve_team(
        &mut self,
        project: ProjectId,
        students: &[StudentId],
        now: DateTime<Utc>,
    ) -> Result<(), Error>;

    /// Compensation: put the given students back to Available with no
    /// assigned project. Preference ranks are left untouched.
    async fn release_students(
        &mut self,
        students: &[StudentId],
        now: DateTime<Utc>,
    ) -> Result<(), Error>;
}

pub struct MysqlLoader {
    pool: MySqlPool,
}

impl MysqlLoader {
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let pool = MySqlPoolOptions::new()
            .max_connections(2)
            .connect(url)
            .await
            .wrap_err("cannot connect to storage")?;
        Ok(MysqlLoader { pool })
    }
}

impl Loader for MysqlLoader {
    async fn expire_pending(
        &mut self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64, Error> {
        let result = sqlx::query(
            "UPDATE Students \
             SET Status = ?, ProjectId = NULL, \
                 ProjectPriority1 = NULL, ProjectPriority2 = NULL, \
                 ProjectPriority3 = NULL, ProjectPriority4 = NULL, \
                 UpdatedAt = ? \
             WHERE Status = ? AND StartPendingAt < ?",
        )
        .bind(Status::Available.code())
        .bind(now)
        .bind(Status::Pending.code())
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .wrap_err("cannot expire pending students")?;
        Ok(result.rows_affected())
    }

    async fn load_projects(&mut self) -> Result<Vec<Project>, Error> {
        sqlx::query("SELECT Id, Title, CreatedAt, CriteriaIds FROM Projects")
            .map(|row: MySqlRow| {
                Ok(Project {
                    id: ProjectId(row.get::<i32, _>("Id")),
                    title: row.get("Title"),
                    created_at: row.get::<DateTime<Utc>, _>("CreatedAt"),
                    criteria: parse_criteria_ids(
                        row.get::<Option<String>, _>("CriteriaIds").as_deref(),
                    )?,
                })
            })
            .fetch_all(&self.pool)
            .await
            .wrap_err("cannot load projects")?
            .into_iter()
            .collect()
    }

    async fn save_criteria(
        &mut self,
        project: ProjectId,
        criteria: &BTreeSet<i32>,
    ) -> Result<(), Error> {
        sqlx::query("UPDATE Projects SET CriteriaIds = ? WHERE Id = ?")
            .bind(criteria_ids_csv(criteria))
            .bind(project.0)
            .execute(&self.pool)
            .await
            .wrap_err("cannot save project criteria")?;
        Ok(())
    }

    async fn load_pending_students(&mut self) -> Result<Vec<PendingStudent>, Error> {
        sqlx::query(
            "SELECT Id, IsAdmin, StartPendingAt, \
                    ProjectPriority1, ProjectPriority2, ProjectPriority3, ProjectPriority4 \
             FROM Students \
             WHERE Status = ? AND StartPendingAt IS NOT NULL \
             ORDER BY Id",
        )
        .bind(Status::Pending.code())
        .map(|row: MySqlRow| PendingStudent {
            id: StudentId(row.get::<i32, _>("Id")),
            is_admin: row.get::<bool, _>("IsAdmin"),
            pending_since: row.get::<DateTime<Utc>, _>("StartPendingAt"),
            priorities: [
                row.get::<Option<i32>, _>("ProjectPriority1").map(ProjectId),
                row.get::<Option<i32>, _>("ProjectPriority2").map(ProjectId),
                row.get::<Option<i32>, _>("ProjectPriority3").map(ProjectId),
                row.get::<Option<i32>, _>("ProjectPriority4").map(ProjectId),
            ],
        })
        .fetch_all(&self.pool)
        .await
        .wrap_err("cannot load pending students")
    }

    async fn load_active_roles(&mut self) -> Result<HashMap<StudentId, Role>, Error> {
        let rows = sqlx::query(
            "SELECT sr.StudentId, r.RoleId, r.Type, r.Name \
             FROM StudentRoles sr \
             JOIN Roles r ON r.RoleId = sr.RoleId \
             WHERE sr.IsActive = 1 \
             ORDER BY sr.StudentId, sr.RoleId",
        )
        .fetch_all(&self.pool)
        .await
        .wrap_err("cannot load role assignments")?;
        let mut roles = HashMap::new();
        for row in rows {
            let student = StudentId(row.get::<i32, _>("StudentId"));
            roles.entry(student).or_insert_with(|| Role {
                id: RoleId(row.get::<i32, _>("RoleId")),
                kind: RoleType::from_code(row.get::<i32, _>("Type")),
                name: row.get("Name"),
            });
        }
        Ok(roles)
    }

    async fn reserve_team(
        &mut self,
        project: ProjectId,
        students: &[StudentId],
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        let mut tx = self
            .pool
            .begin()
            .await
            .wrap_err("cannot begin reservation transaction")?;
        for student in students {
            sqlx::query("UPDATE Students SET Status = ?, ProjectId = ?, UpdatedAt = ? WHERE Id = ?")
                .bind(Status::Assigned.code())
                .bind(project.0)
                .bind(now)
                .bind(student.0)
                .execute(&mut *tx)
                .await
                .wrap_err("cannot reserve student for team")?;
        }
        tx.commit()
            .await
            .wrap_err("error when committing reservation")?;
        Ok(())
    }

    async fn release_students(
        &mut self,
        students: &[StudentId],
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        let mut tx = self
            .pool
            .begin()
            .await
            .wrap_err("cannot begin release transaction")?;
        for student in students {
            sqlx::query(
                "UPDATE Students SET Status = ?, ProjectId = NULL, UpdatedAt = ? WHERE Id = ?",
            )
            .bind(Status::Available.code())
            .bind(now)
            .bind(student.0)
            .execute(&mut *tx)
            .await
            .wrap_err("cannot release reserved student")?;
        }
        tx.commit().await.wrap_err("error when committing release")?;
        Ok(())
    }
}
