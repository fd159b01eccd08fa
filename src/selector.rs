//! Greedy team construction for a single project's candidate group.

use std::collections::HashSet;

use thiserror::Error;

use crate::config::TeamRules;
use crate::model::{Candidate, ProjectId, RoleType, Team};

/// Why a candidate group did not produce a team.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum Rejection {
    #[error("team has {size} members, minimum is {minimum}")]
    BelowMinimumSize { size: usize, minimum: usize },
    #[error("team has {count} UI/UX designers instead of exactly one")]
    UiUxDesignerCount { count: usize },
    #[error("team has {count} product managers instead of exactly one")]
    ProductManagerCount { count: usize },
    #[error("team has {count} admins instead of exactly one")]
    AdminCount { count: usize },
    #[error(
        "invalid developer mix: {fullstack} fullstack, {frontend} frontend, {backend} backend"
    )]
    DeveloperMix {
        fullstack: usize,
        frontend: usize,
        backend: usize,
    },
}

/// Assemble a team for `project` from its candidate rows, which must already
/// be sorted by priority rank, then pending-since (the collector's order).
///
/// A single greedy walk fills one slot per role id, then bounded repair
/// passes fix up the required roles. Teams are single-digit sized, so
/// backtracking search would buy nothing over this.
pub fn select_team(
    project: ProjectId,
    candidates: &[Candidate],
    rules: &TeamRules,
) -> Result<Team, Rejection> {
    let mut members: Vec<Candidate> = Vec::new();

    // First candidate per role id wins its slot, except that a later admin
    // takes the slot from a non-admin incumbent. The walk keeps going past
    // the minimum size until every required role is exactly filled.
    for candidate in candidates {
        if walk_satisfied(&members, rules) {
            break;
        }
        match members.iter().position(|m| m.role.id == candidate.role.id) {
            Some(slot) => {
                if candidate.is_admin && !members[slot].is_admin {
                    members[slot] = candidate.clone();
                }
            }
            None => members.push(candidate.clone()),
        }
    }

    if members.len() < rules.minimum_size {
        return Err(Rejection::BelowMinimumSize {
            size: members.len(),
            minimum: rules.minimum_size,
        });
    }

    if rules.require_uiux_designer {
        repair_single_role(&mut members, candidates, RoleType::UiUxDesigner);
    }
    if rules.require_product_manager {
        repair_single_role(&mut members, candidates, RoleType::ProductManager);
    }

    if rules.require_admin {
        // Injection can only add an admin; a surplus is unrepairable.
        if admin_count(&members) == 0 {
            inject_admin(&mut members, candidates);
        }
        let count = admin_count(&members);
        if count != 1 {
            return Err(Rejection::AdminCount { count });
        }
    }

    if rules.require_uiux_designer {
        let count = kind_count(&members, RoleType::UiUxDesigner);
        if count != 1 {
            return Err(Rejection::UiUxDesignerCount { count });
        }
    }
    if rules.require_product_manager {
        let count = kind_count(&members, RoleType::ProductManager);
        if count != 1 {
            return Err(Rejection::ProductManagerCount { count });
        }
    }

    if rules.require_developer_mix {
        let (fullstack, frontend, backend) = developer_counts(&members);
        if fullstack == 1 && frontend + backend > 0 {
            // One fullstack covers both ends, so the named developers go.
            members.retain(|m| !(m.role.is_frontend() || m.role.is_backend()));
            if members.len() < rules.minimum_size {
                return Err(Rejection::BelowMinimumSize {
                    size: members.len(),
                    minimum: rules.minimum_size,
                });
            }
        }
        let (fullstack, frontend, backend) = developer_counts(&members);
        let valid = match fullstack {
            1 => true,
            0 => frontend >= 1 && backend >= 1,
            _ => false,
        };
        if !valid {
            return Err(Rejection::DeveloperMix {
                fullstack,
                frontend,
                backend,
            });
        }
    }

    if rules.require_admin {
        // Dropping named developers above can take the admin with them.
        if admin_count(&members) == 0 {
            if let Some(admin) = candidates
                .iter()
                .find(|c| c.is_admin && fits_open_slot(c, &members, rules))
            {
                members.push(admin.clone());
            }
        }
        let count = admin_count(&members);
        if count != 1 {
            return Err(Rejection::AdminCount { count });
        }
    }

    let mut seen = HashSet::new();
    members.retain(|m| seen.insert(m.student));

    Ok(Team { project, members })
}

/// Whether the walk can stop: large enough, and every required single role
/// is exactly filled. With the developer rule on, a lone fullstack only
/// settles the team if it stays large enough once the named developers are
/// dropped in its favour.
fn walk_satisfied(members: &[Candidate], rules: &TeamRules) -> bool {
    if members.len() < rules.minimum_size {
        return false;
    }
    if rules.require_uiux_designer && kind_count(members, RoleType::UiUxDesigner) != 1 {
        return false;
    }
    if rules.require_product_manager && kind_count(members, RoleType::ProductManager) != 1 {
        return false;
    }
    if rules.require_developer_mix {
        let (fullstack, frontend, backend) = developer_counts(members);
        let settled = match fullstack {
            1 => members.len() - frontend - backend >= rules.minimum_size,
            0 => frontend >= 1 && backend >= 1,
            _ => false,
        };
        if !settled {
            return false;
        }
    }
    true
}

/// Bring the number of `kind` members to exactly one where possible: pull in
/// the first such candidate on an unused role id when none made the walk,
/// drop all but the first when several did.
fn repair_single_role(members: &mut Vec<Candidate>, candidates: &[Candidate], kind: RoleType) {
    match kind_count(members, kind) {
        0 => {
            let extra = candidates.iter().find(|c| {
                c.role.kind == kind && !members.iter().any(|m| m.role.id == c.role.id)
            });
            if let Some(extra) = extra {
                members.push(extra.clone());
            }
        }
        1 => {}
        _ => {
            let mut kept = false;
            members.retain(|m| {
                if m.role.kind == kind {
                    if kept {
                        return false;
                    }
                    kept = true;
                }
                true
            });
        }
    }
}

/// Give the team an admin by taking over the slot of a non-admin holding the
/// same role id, or by opening a new slot for them.
fn inject_admin(members: &mut Vec<Candidate>, candidates: &[Candidate]) {
    let Some(admin) = candidates.iter().find(|c| c.is_admin) else {
        return;
    };
    match members.iter().position(|m| m.role.id == admin.role.id) {
        Some(slot) => members[slot] = admin.clone(),
        None => members.push(admin.clone()),
    }
}

/// Whether adding `candidate` keeps every already-enforced rule intact: the
/// role id must be free and the addition must not unbalance a required
/// single role or the developer mix.
fn fits_open_slot(candidate: &Candidate, members: &[Candidate], rules: &TeamRules) -> bool {
    if members.iter().any(|m| m.role.id == candidate.role.id) {
        return false;
    }
    if rules.require_uiux_designer && candidate.role.kind == RoleType::UiUxDesigner {
        return false;
    }
    if rules.require_product_manager && candidate.role.kind == RoleType::ProductManager {
        return false;
    }
    if rules.require_developer_mix {
        if candidate.role.kind == RoleType::Fullstack {
            return false;
        }
        let (fullstack, _, _) = developer_counts(members);
        if fullstack > 0 && (candidate.role.is_frontend() || candidate.role.is_backend()) {
            return false;
        }
    }
    true
}

fn kind_count(members: &[Candidate], kind: RoleType) -> usize {
    members.iter().filter(|m| m.role.kind == kind).count()
}

fn admin_count(members: &[Candidate]) -> usize {
    members.iter().filter(|m| m.is_admin).count()
}

fn developer_counts(members: &[Candidate]) -> (usize, usize, usize) {
    let fullstack = kind_count(members, RoleType::Fullstack);
    let frontend = members.iter().filter(|m| m.role.is_frontend()).count();
    let backend = members.iter().filter(|m| m.role.is_backend()).count();
    (fullstack, frontend, backend)
}
