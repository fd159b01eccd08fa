//! Client for the external board-creation service.

use chrono::{DateTime, Days, Utc};
use eyre::{Error, WrapErr, ensure};
use reqwest::Client;
use serde::Serialize;

use crate::config::BoardConfig;
use crate::model::Team;

const MEETING_DURATION_MINUTES: i64 = 30;

/// Payload understood by the board service.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardRequest {
    pub project_id: i32,
    pub student_ids: Vec<i32>,
    pub title: String,
    pub date_time_utc: DateTime<Utc>,
    pub duration_minutes: i64,
}

impl BoardRequest {
    /// Build the creation request for a freshly reserved team. The proposed
    /// meeting is noon UTC on the day after `now`, for thirty minutes.
    pub fn for_team(team: &Team, title: &str, now: DateTime<Utc>) -> BoardRequest {
        BoardRequest {
            project_id: team.project.0,
            student_ids: team.student_ids().iter().map(|s| s.0).collect(),
            title: title.to_owned(),
            date_time_utc: meeting_slot(now),
            duration_minutes: MEETING_DURATION_MINUTES,
        }
    }
}

/// Noon UTC one calendar day after `now`.
fn meeting_slot(now: DateTime<Utc>) -> DateTime<Utc> {
    (now.date_naive() + Days::new(1))
        .and_hms_opt(12, 0, 0)
        .expect("noon is a valid time of day")
        .and_utc()
}

/// Outbound boundary to the board service.
#[allow(async_fn_in_trait)]
pub trait BoardService {
    /// Ask the external service to create a board for the team. Any
    /// non-success status, transport error or timeout counts as failure.
    async fn create_board(&self, request: &BoardRequest) -> Result<(), Error>;
}

pub struct HttpBoardService {
    client: Client,
    url: String,
}

impl HttpBoardService {
    pub fn new(config: &BoardConfig) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .wrap_err("cannot build the board service client")?;
        Ok(HttpBoardService {
            client,
            url: config.url.clone(),
        })
    }
}

impl BoardService for HttpBoardService {
    async fn create_board(&self, request: &BoardRequest) -> Result<(), Error> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .wrap_err("board service request failed")?;
        ensure!(
            response.status().is_success(),
            "board service answered with status {}",
            response.status()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::model::{Candidate, ProjectId, Role, RoleId, RoleType, StudentId};

    #[test]
    fn meeting_is_noon_utc_the_next_day() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 16, 45, 12).unwrap();
        assert_eq!(
            meeting_slot(now),
            Utc.with_ymd_and_hms(2026, 3, 3, 12, 0, 0).unwrap()
        );
        // Late in the evening still lands on the next calendar day, and
        // month boundaries roll over.
        let now = Utc.with_ymd_and_hms(2026, 3, 31, 23, 59, 59).unwrap();
        assert_eq!(
            meeting_slot(now),
            Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn request_serializes_to_the_service_wire_format() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 16, 45, 12).unwrap();
        let team = Team {
            project: ProjectId(12),
            members: vec![Candidate {
                student: StudentId(7),
                project: ProjectId(12),
                rank: 1,
                pending_since: now,
                is_admin: true,
                role: Role {
                    id: RoleId(3),
                    kind: RoleType::Fullstack,
                    name: "Fullstack Developer".into(),
                },
            }],
        };
        let request = BoardRequest::for_team(&team, "Course catalogue", now);
        let wire = serde_json::to_value(&request).unwrap();
        assert_eq!(
            wire,
            serde_json::json!({
                "projectId": 12,
                "studentIds": [7],
                "title": "Course catalogue",
                "dateTimeUtc": "2026-03-03T12:00:00Z",
                "durationMinutes": 30,
            })
        );
    }
}
