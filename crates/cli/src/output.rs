//! Text and JSON rendering for command results.

use anyhow::Result;
use serde::Serialize;
use tally_analytics::{
    CategoryReport, CompletionTimesReport, IntegrityWarning, Leaderboard, OverallProgress,
    ProjectReport, UserReport,
};
use tally_core::{Category, Problem, Project, User};

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn optional<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

fn format_secs(secs: Option<f64>) -> String {
    match secs {
        Some(secs) if secs.abs() >= 3600.0 => format!("{:.1}h", secs / 3600.0),
        Some(secs) if secs.abs() >= 60.0 => format!("{:.1}m", secs / 60.0),
        Some(secs) => format!("{:.0}s", secs),
        None => "-".to_string(),
    }
}

fn format_ratio(ratio: Option<f64>) -> String {
    optional(ratio.map(|r| format!("{:.0}%", r * 100.0)))
}

fn print_warnings(warnings: &[IntegrityWarning]) {
    if warnings.is_empty() {
        return;
    }
    println!("Warnings ({})", warnings.len());
    for warning in warnings {
        println!(
            "  {:?} | {} {} | {}",
            warning.kind, warning.entity, warning.id, warning.message
        );
    }
}

pub fn user(user: &User, json: bool) -> Result<()> {
    if json {
        return print_json(user);
    }
    println!("User: {} - {}", user.id, user.name);
    Ok(())
}

pub fn users(users: &[User], json: bool) -> Result<()> {
    if json {
        return print_json(users);
    }
    println!("Users ({})", users.len());
    for user in users {
        println!("  {} | {}", user.id, user.name);
    }
    Ok(())
}

pub fn category(category: &Category, json: bool) -> Result<()> {
    if json {
        return print_json(category);
    }
    println!(
        "Category: {} - {} ({} points)",
        category.id, category.name, category.points
    );
    Ok(())
}

pub fn categories(categories: &[Category], json: bool) -> Result<()> {
    if json {
        return print_json(categories);
    }
    println!("Categories ({})", categories.len());
    for category in categories {
        println!("  {} | {} | {}", category.id, category.points, category.name);
    }
    Ok(())
}

pub fn project(project: &Project, json: bool) -> Result<()> {
    if json {
        return print_json(project);
    }
    println!("Project: {}", project.id);
    println!("  Name: {}", project.name);
    if !project.description.is_empty() {
        println!("  Description: {}", project.description);
    }
    println!("  Status: {}", project.status);
    println!("  Planned: {} weeks", project.planned_duration.weeks());
    println!("  Members: {}", project.members.len());
    println!("  Created: {}", project.created_at);
    if let Some(completed_at) = project.completed_at {
        println!("  Completed: {}", completed_at);
    }
    if let Some(archived_at) = project.archived_at {
        println!("  Archived: {}", archived_at);
    }
    Ok(())
}

pub fn projects(projects: &[Project], json: bool) -> Result<()> {
    if json {
        return print_json(projects);
    }
    println!("Projects ({})", projects.len());
    for project in projects {
        println!(
            "  {} | {} | {}w | {}",
            project.id,
            project.status,
            project.planned_duration.weeks(),
            project.name
        );
    }
    Ok(())
}

pub fn problem(problem: &Problem, json: bool) -> Result<()> {
    if json {
        return print_json(problem);
    }
    println!("Problem: {}", problem.id);
    println!("  Title: {}", problem.title);
    if !problem.description.is_empty() {
        println!("  Description: {}", problem.description);
    }
    println!("  Status: {}", problem.status);
    println!("  Category: {}", problem.category_id);
    println!("  Project: {}", optional(problem.project_id));
    println!("  Assignee: {}", optional(problem.assignee));
    if let Some(completed_by) = problem.completed_by {
        println!("  Completed by: {}", completed_by);
    }
    if let Some(reference) = &problem.completion_reference {
        println!("  Reference: {}", reference);
    }
    if let Some(points) = problem.points_awarded {
        println!("  Points: {}", points);
    }
    Ok(())
}

pub fn problems(problems: &[Problem], json: bool) -> Result<()> {
    if json {
        return print_json(problems);
    }
    println!("Problems ({})", problems.len());
    for problem in problems {
        println!(
            "  {} | {} | {} | {}",
            problem.id,
            problem.status,
            optional(problem.assignee),
            problem.title
        );
    }
    Ok(())
}

pub fn overall(report: &OverallProgress, json: bool) -> Result<()> {
    if json {
        return print_json(report);
    }
    println!("Overall (revision {})", report.revision);
    println!("  Projects: {}", report.total_projects);
    for (status, count) in &report.projects_by_status {
        println!("    {}: {}", status, count);
    }
    println!("  Projects by planned length:");
    for (weeks, by_status) in &report.projects_by_planned_weeks {
        let counts: Vec<String> = by_status
            .iter()
            .map(|(status, count)| format!("{} {}", status, count))
            .collect();
        println!("    {}w: {}", weeks, counts.join(", "));
    }
    println!("  Problems: {}", report.total_problems);
    for (status, count) in &report.problems_by_status {
        println!("    {}: {}", status, count);
    }
    println!("  Points earned: {}", report.total_points);
    print_warnings(&report.warnings);
    Ok(())
}

pub fn category_report(report: &CategoryReport, json: bool) -> Result<()> {
    if json {
        return print_json(report);
    }
    println!("Categories (revision {})", report.revision);
    for stats in report.categories.values() {
        println!(
            "  {} | {} pts | {}/{} done ({}) | {} earned | mean {} | median {}",
            stats.name,
            stats.points,
            stats.completed,
            stats.total,
            format_ratio(stats.completion_rate),
            stats.total_points,
            format_secs(stats.mean_completion_secs),
            format_secs(stats.median_completion_secs)
        );
    }
    print_warnings(&report.warnings);
    Ok(())
}

pub fn user_report(report: &UserReport, json: bool) -> Result<()> {
    if json {
        return print_json(report);
    }
    println!("Users (revision {})", report.revision);
    for stats in report.users.values() {
        let statuses: Vec<String> = stats
            .by_status
            .iter()
            .map(|(status, count)| format!("{} {}", status, count))
            .collect();
        println!(
            "  {} | {} claimed | {} done | {} pts | {}",
            stats.name,
            stats.claimed,
            stats.completed,
            stats.points,
            statuses.join(", ")
        );
    }
    print_warnings(&report.warnings);
    Ok(())
}

pub fn project_report(report: &ProjectReport, json: bool) -> Result<()> {
    if json {
        return print_json(report);
    }
    println!("Projects (revision {})", report.revision);
    for stats in report.projects.values() {
        let overrun = match stats.over_planned {
            Some(true) => " (over plan)",
            _ => "",
        };
        println!(
            "  {} | {} | {} members | {}/{} done ({}) | {}w planned | took {}{}",
            stats.name,
            stats.status,
            stats.member_count,
            stats.completed_problems,
            stats.linked_problems,
            format_ratio(stats.completion_ratio),
            stats.planned_weeks,
            format_secs(stats.duration_secs),
            overrun
        );
    }
    print_warnings(&report.warnings);
    Ok(())
}

pub fn leaderboard(board: &Leaderboard, json: bool) -> Result<()> {
    if json {
        return print_json(board);
    }
    println!("Leaderboard (revision {})", board.revision);
    for entry in &board.entries {
        println!("  {:>3}. {} - {} pts", entry.rank, entry.name, entry.points);
    }
    print_warnings(&board.warnings);
    Ok(())
}

pub fn completion_times(report: &CompletionTimesReport, json: bool) -> Result<()> {
    if json {
        return print_json(report);
    }
    println!("Completion times (revision {})", report.revision);
    println!(
        "  mean {} | median {}",
        format_secs(report.mean_lead_secs),
        format_secs(report.median_lead_secs)
    );
    for row in &report.problems {
        println!(
            "  {} | {} | {} | {}",
            row.problem_id,
            row.completed_at,
            format_secs(Some(row.lead_secs)),
            row.title
        );
    }
    print_warnings(&report.warnings);
    Ok(())
}
