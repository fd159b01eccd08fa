//! Drives one tick of the pipeline: expiry, tagging, candidate collection,
//! then per-project selection and the reserve-then-notify sequence.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use eyre::Error;
use tracing::{debug, info, instrument, warn};

use crate::board::{BoardRequest, BoardService};
use crate::collector;
use crate::config::{SchedulerConfig, TeamRules};
use crate::expirer;
use crate::loader::Loader;
use crate::model::{Candidate, Project, ProjectId, StudentId};
use crate::selector;
use crate::tagger;

/// What a single tick did.
#[derive(Debug, Eq, PartialEq)]
pub enum TickOutcome {
    /// A team was reserved and its board created.
    BoardCreated {
        project: ProjectId,
        students: Vec<StudentId>,
    },
    /// A team was found but nothing was written because of the dry run.
    WouldCreate {
        project: ProjectId,
        students: Vec<StudentId>,
    },
    /// Nobody is waiting for a team.
    NoCandidates,
    /// Candidates exist but no group ended in a durable team and board.
    NoBoard,
}

pub struct Orchestrator<L, B> {
    loader: L,
    board: B,
    rules: TeamRules,
    scheduler: SchedulerConfig,
    dry_run: bool,
}

impl<L: Loader, B: BoardService> Orchestrator<L, B> {
    pub fn new(
        loader: L,
        board: B,
        rules: TeamRules,
        scheduler: SchedulerConfig,
        dry_run: bool,
    ) -> Orchestrator<L, B> {
        Orchestrator {
            loader,
            board,
            rules,
            scheduler,
            dry_run,
        }
    }

    /// Run one full pass: expire stuck students, refresh project tags,
    /// collect candidates and work through the project groups best-first
    /// until one team is durably reserved and its board created. At most one
    /// board comes out of a tick; remaining groups wait for the next one.
    #[instrument(skip_all)]
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<TickOutcome, Error> {
        if self.dry_run {
            info!("Dry run, no changes will be written");
        } else {
            expirer::run(&mut self.loader, now, self.scheduler.max_pending_hours).await?;
        }
        let projects: HashMap<ProjectId, Project> = tagger::run(
            &mut self.loader,
            now,
            self.scheduler.new_project_max_age_days,
            self.dry_run,
        )
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

        let mut candidates = collector::collect(&mut self.loader).await?;
        if self.dry_run {
            // The skipped expirer would have released these students.
            let cutoff = expirer::expiry_cutoff(now, self.scheduler.max_pending_hours);
            let before = candidates.len();
            candidates.retain(|c| c.pending_since >= cutoff);
            if candidates.len() < before {
                debug!(
                    "Ignored {} rows from students past the pending window",
                    before - candidates.len()
                );
            }
        }
        if candidates.is_empty() {
            info!("No pending candidates, nothing to do");
            return Ok(TickOutcome::NoCandidates);
        }

        let groups = group_candidates(candidates);
        info!("Considering {} projects with pending candidates", groups.len());
        debug!("Group order: {:?}", groups.iter().map(|g| g.project.0).collect::<Vec<_>>());
        for group in groups {
            let Some(project) = projects.get(&group.project) else {
                warn!("Ignoring candidates for unknown project {}", group.project);
                continue;
            };
            let team = match selector::select_team(group.project, &group.candidates, &self.rules) {
                Ok(team) => team,
                Err(rejection) => {
                    info!("No team for {}: {}", project.title, rejection);
                    continue;
                }
            };
            let students = team.student_ids();
            if self.dry_run {
                info!(
                    "Would reserve students {:?} for {} and request a board",
                    students.iter().map(|s| s.0).collect::<Vec<_>>(),
                    project.title
                );
                return Ok(TickOutcome::WouldCreate {
                    project: team.project,
                    students,
                });
            }
            debug!(
                "Reserving students {:?} for {}",
                students.iter().map(|s| s.0).collect::<Vec<_>>(),
                project.title
            );
            self.loader.reserve_team(team.project, &students, now).await?;
            let request = BoardRequest::for_team(&team, &project.title, now);
            match self.board.create_board(&request).await {
                Ok(()) => {
                    info!("Created a board for {} with {} members", project.title, students.len());
                    return Ok(TickOutcome::BoardCreated {
                        project: team.project,
                        students,
                    });
                }
                Err(err) => {
                    warn!(
                        "Board creation for {} failed ({:#}), releasing {} students",
                        project.title,
                        err,
                        students.len()
                    );
                    // The release is a second transaction. If the process
                    // dies between the reservation commit and this point,
                    // the students stay Assigned without a board and need
                    // manual reconciliation.
                    self.loader.release_students(&students, now).await?;
                }
            }
        }
        Ok(TickOutcome::NoBoard)
    }
}

/// Candidate rows for one project, still in the collector's order.
struct ProjectGroup {
    project: ProjectId,
    candidates: Vec<Candidate>,
}

impl ProjectGroup {
    /// Groups are tried best-first: a group holding somebody's top
    /// preference beats one that is only ever a lower choice, and between
    /// equals the group with the longest-waiting student goes first.
    fn selection_priority(&self) -> (u8, DateTime<Utc>) {
        let rank = self
            .candidates
            .iter()
            .map(|c| c.rank)
            .min()
            .expect("groups are never empty");
        let since = self
            .candidates
            .iter()
            .map(|c| c.pending_since)
            .min()
            .expect("groups are never empty");
        (rank, since)
    }
}

fn group_candidates(candidates: Vec<Candidate>) -> Vec<ProjectGroup> {
    // Grouping through a BTreeMap keeps ties on the priority key in
    // project-id order, reproducible across runs.
    let mut by_project: BTreeMap<ProjectId, Vec<Candidate>> = BTreeMap::new();
    for candidate in candidates {
        by_project
            .entry(candidate.project)
            .or_default()
            .push(candidate);
    }
    let mut groups: Vec<ProjectGroup> = by_project
        .into_iter()
        .map(|(project, candidates)| ProjectGroup { project, candidates })
        .collect();
    groups.sort_by_key(ProjectGroup::selection_priority);
    groups
}
