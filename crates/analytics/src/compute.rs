//! Report computation over a snapshot.
//!
//! Pure functions: the same snapshot and config always produce the same
//! report. Archived projects and problems are left out of every metric.

use std::collections::{BTreeMap, HashMap};

use tally_core::{
    timing, Category, CategoryId, PlannedDuration, Problem, ProblemStatus, Project, ProjectStatus,
    User,
};
use tally_storage::Snapshot;

use crate::config::{AnalyticsConfig, PointsPolicy};
use crate::integrity;
use crate::report::{
    CategoryReport, CategoryStats, CompletionTime, CompletionTimesReport, Leaderboard, LeaderboardEntry, OverallProgress, ProjectReport,
    ProjectStats, UserReport, UserStats,
};

/// Indexed view of one snapshot.
struct View<'a> {
    snapshot: &'a Snapshot,
    config: &'a AnalyticsConfig,
    categories: HashMap<CategoryId, &'a Category>,
}

impl<'a> View<'a> {
    fn new(snapshot: &'a Snapshot, config: &'a AnalyticsConfig) -> Self {
        Self {
            snapshot,
            config,
            categories: snapshot.categories.iter().map(|c| (c.id, c)).collect(),
        }
    }

    fn problems(&self) -> impl Iterator<Item = &'a Problem> + 'a {
        self.snapshot.problems.iter().filter(|p| !p.is_archived())
    }

    fn projects(&self) -> impl Iterator<Item = &'a Project> + 'a {
        self.snapshot.projects.iter().filter(|p| !p.is_archived())
    }

    fn completed(&self) -> impl Iterator<Item = &'a Problem> + 'a {
        self.problems()
            .filter(|p| p.status == ProblemStatus::Completed)
    }

    /// Points credited for a completed problem; orphans earn nothing.
    fn points_for(&self, problem: &Problem) -> u64 {
        let current = self.categories.get(&problem.category_id).map(|c| c.points);
        let points = match self.config.points_policy {
            PointsPolicy::Current => current,
            PointsPolicy::Frozen => problem.points_awarded.or(current),
        };
        u64::from(points.unwrap_or(0))
    }
}

/// Status counts and total points.
pub fn overall_progress(snapshot: &Snapshot, config: &AnalyticsConfig) -> OverallProgress {
    let view = View::new(snapshot, config);

    let mut projects_by_status: BTreeMap<ProjectStatus, usize> =
        ProjectStatus::ALL.iter().map(|s| (*s, 0)).collect();
    let mut projects_by_planned_weeks: BTreeMap<u8, BTreeMap<ProjectStatus, usize>> =
        PlannedDuration::ALL
            .iter()
            .map(|d| (d.weeks(), projects_by_status.clone()))
            .collect();
    let mut total_projects = 0;
    for project in view.projects() {
        *projects_by_status.entry(project.status).or_default() += 1;
        *projects_by_planned_weeks
            .entry(project.planned_duration.weeks())
            .or_default()
            .entry(project.status)
            .or_default() += 1;
        total_projects += 1;
    }

    let mut problems_by_status: BTreeMap<ProblemStatus, usize> =
        ProblemStatus::ALL.iter().map(|s| (*s, 0)).collect();
    let mut total_problems = 0;
    for problem in view.problems() {
        *problems_by_status.entry(problem.status).or_default() += 1;
        total_problems += 1;
    }

    let total_points = view.completed().map(|p| view.points_for(p)).sum();

    OverallProgress {
        revision: snapshot.revision,
        projects_by_status,
        projects_by_planned_weeks,
        problems_by_status,
        total_projects,
        total_problems,
        total_points,
        warnings: integrity::scan(snapshot),
    }
}

/// Completion count, points and durations per category.
pub fn by_category(snapshot: &Snapshot, config: &AnalyticsConfig) -> CategoryReport {
    let view = View::new(snapshot, config);
    let mut durations: HashMap<CategoryId, Vec<f64>> = HashMap::new();
    let mut categories: BTreeMap<CategoryId, CategoryStats> = snapshot
        .categories
        .iter()
        .map(|c| {
            (
                c.id,
                CategoryStats {
                    category_id: c.id,
                    name: c.name.clone(),
                    points: c.points,
                    total: 0,
                    completed: 0,
                    completion_rate: None,
                    total_points: 0,
                    mean_completion_secs: None,
                    median_completion_secs: None,
                },
            )
        })
        .collect();

    for problem in view.problems() {
        if let Some(stats) = categories.get_mut(&problem.category_id) {
            stats.total += 1;
        }
    }

    for problem in view.completed() {
        let Some(stats) = categories.get_mut(&problem.category_id) else {
            continue;
        };
        stats.completed += 1;
        stats.total_points += view.points_for(problem);

        // Negative spans are reported by the integrity scan, not averaged.
        if let Some(elapsed) = timing::time_to_complete(problem).filter(|e| !e.is_negative()) {
            durations
                .entry(problem.category_id)
                .or_default()
                .push(elapsed.as_secs_f64());
        }
    }

    for (id, stats) in categories.iter_mut() {
        stats.completion_rate =
            (stats.total > 0).then(|| stats.completed as f64 / stats.total as f64);
        if let Some(values) = durations.get_mut(id) {
            stats.mean_completion_secs = mean(values);
            stats.median_completion_secs = median(values);
        }
    }

    CategoryReport {
        revision: snapshot.revision,
        categories,
        warnings: integrity::scan(snapshot),
    }
}

/// Claims, completions and points per user; every user is listed.
pub fn by_user(snapshot: &Snapshot, config: &AnalyticsConfig) -> UserReport {
    let view = View::new(snapshot, config);
    let mut users: BTreeMap<_, UserStats> = snapshot
        .users
        .iter()
        .map(|u| (u.id, empty_user_stats(u)))
        .collect();

    for problem in view.problems() {
        if let Some(holder) = problem.assignee {
            if let Some(stats) = users.get_mut(&holder) {
                stats.claimed += 1;
                *stats.by_status.entry(problem.status).or_default() += 1;
            }
        }
        if problem.status != ProblemStatus::Completed {
            continue;
        }
        let Some(finisher) = problem.completed_by else {
            continue;
        };
        if let Some(stats) = users.get_mut(&finisher) {
            stats.claimed += 1;
            stats.completed += 1;
            *stats.by_status.entry(ProblemStatus::Completed).or_default() += 1;
            stats.points += view.points_for(problem);
        }
    }

    UserReport {
        revision: snapshot.revision,
        users,
        warnings: integrity::scan(snapshot),
    }
}

/// Membership, linked problems and completion ratio per project.
pub fn by_project(snapshot: &Snapshot, config: &AnalyticsConfig) -> ProjectReport {
    let view = View::new(snapshot, config);
    let mut linked: HashMap<_, (usize, usize)> = HashMap::new();
    for problem in view.problems() {
        if let Some(project_id) = problem.project_id {
            let entry = linked.entry(project_id).or_insert((0, 0));
            entry.0 += 1;
            if problem.status == ProblemStatus::Completed {
                entry.1 += 1;
            }
        }
    }

    let projects = view
        .projects()
        .map(|project| {
            let (total, completed) = linked.get(&project.id).copied().unwrap_or((0, 0));
            let duration = timing::project_duration(project);
            let stats = ProjectStats {
                project_id: project.id,
                name: project.name.clone(),
                status: project.status,
                member_count: project.members.len(),
                linked_problems: total,
                completed_problems: completed,
                completion_ratio: (total > 0).then(|| completed as f64 / total as f64),
                planned_weeks: project.planned_duration.weeks(),
                duration_secs: duration.map(|d| d.as_secs_f64()),
                over_planned: duration
                    .map(|d| d.as_duration() > project.planned_duration.as_duration()),
            };
            (project.id, stats)
        })
        .collect();

    ProjectReport {
        revision: snapshot.revision,
        projects,
        warnings: integrity::scan(snapshot),
    }
}

/// Users ranked by points, ties broken by name then id.
pub fn leaderboard(snapshot: &Snapshot, config: &AnalyticsConfig) -> Leaderboard {
    let report = by_user(snapshot, config);
    let mut rows: Vec<UserStats> = report.users.into_values().collect();
    rows.sort_by(|a, b| {
        b.points
            .cmp(&a.points)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.user_id.cmp(&b.user_id))
    });

    let entries = rows
        .into_iter()
        .enumerate()
        .map(|(i, stats)| LeaderboardEntry {
            rank: i + 1,
            user_id: stats.user_id,
            name: stats.name,
            points: stats.points,
        })
        .collect();

    Leaderboard {
        revision: snapshot.revision,
        entries,
        warnings: report.warnings,
    }
}

/// Creation-to-completion time of every completed problem, newest first.
pub fn completion_times(snapshot: &Snapshot, config: &AnalyticsConfig) -> CompletionTimesReport {
    let view = View::new(snapshot, config);
    let mut problems: Vec<CompletionTime> = view
        .completed()
        .filter_map(|problem| {
            let completed_at = problem.completed_at?;
            let lead = timing::lead_time(problem)?;
            Some(CompletionTime {
                problem_id: problem.id,
                title: problem.title.clone(),
                category_id: problem.category_id,
                created_at: problem.created_at,
                completed_at,
                lead_secs: lead.as_secs_f64(),
            })
        })
        .collect();
    problems.sort_by(|a, b| {
        b.completed_at
            .cmp(&a.completed_at)
            .then_with(|| a.problem_id.cmp(&b.problem_id))
    });

    let mut leads: Vec<f64> = problems
        .iter()
        .map(|p| p.lead_secs)
        .filter(|secs| *secs >= 0.0)
        .collect();

    CompletionTimesReport {
        revision: snapshot.revision,
        mean_lead_secs: mean(&leads),
        median_lead_secs: median(&mut leads),
        problems,
        warnings: integrity::scan(snapshot),
    }
}

fn empty_user_stats(user: &User) -> UserStats {
    UserStats {
        user_id: user.id,
        name: user.name.clone(),
        claimed: 0,
        completed: 0,
        by_status: [
            ProblemStatus::Claimed,
            ProblemStatus::InProgress,
            ProblemStatus::Completed,
        ]
        .into_iter()
        .map(|status| (status, 0))
        .collect(),
        points: 0,
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}
