//! Annotates projects with derived classification tags.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use eyre::Error;
use tracing::{info, instrument};

use crate::loader::Loader;
use crate::model::Project;

/// Tag code marking a recently created project.
pub const NEW_PROJECT_CRITERIA: i32 = 1;

/// The refreshed tag set for `project`, or `None` when nothing changes.
/// Stored tags are always preserved, and the "new project" tag is added
/// while the project is younger than `max_age_days`. The tag is never taken
/// away once the project ages out, so the set only grows.
pub fn refreshed_criteria(
    project: &Project,
    now: DateTime<Utc>,
    max_age_days: i64,
) -> Option<BTreeSet<i32>> {
    let mut criteria = project.criteria.clone();
    if project.created_at > now - Duration::days(max_age_days) {
        criteria.insert(NEW_PROJECT_CRITERIA);
    }
    if criteria == project.criteria {
        None
    } else {
        Some(criteria)
    }
}

/// Refresh the tags of every project, persisting only those that change.
/// Returns the projects with tags up to date so callers do not have to load
/// them twice in a tick.
#[instrument(skip_all)]
pub async fn run<L: Loader>(
    loader: &mut L,
    now: DateTime<Utc>,
    max_age_days: i64,
    dry_run: bool,
) -> Result<Vec<Project>, Error> {
    let mut projects = loader.load_projects().await?;
    let mut tagged = 0_usize;
    for project in &mut projects {
        if let Some(criteria) = refreshed_criteria(project, now, max_age_days) {
            if !dry_run {
                loader.save_criteria(project.id, &criteria).await?;
            }
            project.criteria = criteria;
            tagged += 1;
        }
    }
    if tagged > 0 {
        info!("Tagged {} projects as newly created", tagged);
    }
    Ok(projects)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::model::ProjectId;

    fn project(age_days: i64, criteria: &[i32]) -> (Project, DateTime<Utc>) {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        let project = Project {
            id: ProjectId(1),
            title: "Course catalogue".into(),
            created_at: now - Duration::days(age_days),
            criteria: criteria.iter().copied().collect(),
        };
        (project, now)
    }

    #[test]
    fn young_project_gains_the_new_tag() {
        let (project, now) = project(3, &[]);
        let refreshed = refreshed_criteria(&project, now, 30).unwrap();
        assert!(refreshed.contains(&NEW_PROJECT_CRITERIA));
    }

    #[test]
    fn stored_tags_are_preserved() {
        let (project, now) = project(3, &[4, 9]);
        let refreshed = refreshed_criteria(&project, now, 30).unwrap();
        assert_eq!(
            refreshed.into_iter().collect::<Vec<_>>(),
            vec![NEW_PROJECT_CRITERIA, 4, 9]
        );
    }

    #[test]
    fn old_project_without_the_tag_is_untouched() {
        let (project, now) = project(45, &[4]);
        assert_eq!(refreshed_criteria(&project, now, 30), None);
    }

    #[test]
    fn aged_out_project_keeps_the_tag() {
        let (project, now) = project(45, &[NEW_PROJECT_CRITERIA]);
        assert_eq!(refreshed_criteria(&project, now, 30), None);
    }

    #[test]
    fn already_tagged_young_project_is_not_rewritten() {
        let (project, now) = project(3, &[NEW_PROJECT_CRITERIA]);
        assert_eq!(refreshed_criteria(&project, now, 30), None);
    }
}
