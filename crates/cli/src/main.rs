//! Tally CLI - lifecycle tracking and reporting for problems and projects.

mod config;
mod output;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tally_analytics::{Aggregator, Analytics, PointsPolicy};
use tally_core::{
    CategoryId, ProblemFilter, ProblemId, ProblemStatus, ProjectFilter, ProjectId, ProjectStatus,
    UserId,
};
use tally_lifecycle::{LifecycleController, ProblemSpec, ProjectSpec};
use tally_storage::{JsonStorage, Storage};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::TallyConfig;

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Track problems and projects through their lifecycle", long_about = None)]
struct Cli {
    /// Config file (defaults to ./tally.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Store directory, overrides the config file
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Points policy for reports (current or frozen), overrides the config file
    #[arg(long, global = true)]
    points_policy: Option<PointsPolicy>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage users
    #[command(subcommand)]
    User(UserCommand),
    /// Manage problem categories
    #[command(subcommand)]
    Category(CategoryCommand),
    /// Manage projects
    #[command(subcommand)]
    Project(ProjectCommand),
    /// Manage problems
    #[command(subcommand)]
    Problem(ProblemCommand),
    /// Show reports
    #[command(subcommand)]
    Report(ReportCommand),
}

#[derive(Subcommand)]
enum UserCommand {
    /// Register a user
    Add {
        /// Display name
        name: String,
    },
    /// Rename a user
    Rename {
        /// User ID
        id: UserId,
        /// New display name
        name: String,
    },
    /// List users
    List,
}

#[derive(Subcommand)]
enum CategoryCommand {
    /// Add a category
    Add {
        /// Category name
        name: String,
        /// Points awarded per completed problem
        points: u32,
    },
    /// Change a category's point value
    SetPoints {
        /// Category ID
        id: CategoryId,
        /// New point value
        points: u32,
    },
    /// List categories
    List,
}

#[derive(Subcommand)]
enum ProjectCommand {
    /// Create a project
    Create {
        /// Project name
        name: String,
        /// Planned length in weeks (1-4)
        #[arg(long, default_value = "2")]
        weeks: u8,
        /// Description
        #[arg(long, default_value = "")]
        description: String,
        /// Initial member (repeatable)
        #[arg(long = "member")]
        members: Vec<UserId>,
    },
    /// Add a member to a project
    AddMember {
        /// Project ID
        project: ProjectId,
        /// User ID
        user: UserId,
    },
    /// Move a project to its next status
    Advance {
        /// Project ID
        id: ProjectId,
    },
    /// Archive a project
    Archive {
        /// Project ID
        id: ProjectId,
    },
    /// List projects
    List {
        /// Filter by status
        #[arg(long, value_parser = parse_project_status)]
        status: Option<ProjectStatus>,
        /// Only projects with this member
        #[arg(long)]
        member: Option<UserId>,
        /// Include archived projects
        #[arg(long)]
        all: bool,
    },
}

#[derive(Subcommand)]
enum ProblemCommand {
    /// Create a problem
    Create {
        /// Problem title
        title: String,
        /// Category ID
        #[arg(long)]
        category: CategoryId,
        /// Project to link the problem to
        #[arg(long)]
        project: Option<ProjectId>,
        /// Description
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Claim an open problem
    Claim {
        /// Problem ID
        id: ProblemId,
        /// Claiming user ID
        user: UserId,
    },
    /// Release a claimed problem
    Unclaim {
        /// Problem ID
        id: ProblemId,
    },
    /// Start work on a claimed problem
    Start {
        /// Problem ID
        id: ProblemId,
    },
    /// Complete a problem in progress
    Complete {
        /// Problem ID
        id: ProblemId,
        /// Reference to the finished work
        #[arg(long)]
        reference: Option<String>,
    },
    /// Archive an open or completed problem
    Archive {
        /// Problem ID
        id: ProblemId,
    },
    /// List problems
    List(ProblemListArgs),
}

#[derive(Args)]
struct ProblemListArgs {
    /// Filter by status
    #[arg(long, value_parser = parse_problem_status)]
    status: Option<ProblemStatus>,
    /// Filter by project
    #[arg(long)]
    project: Option<ProjectId>,
    /// Filter by assignee
    #[arg(long)]
    assignee: Option<UserId>,
    /// Filter by category
    #[arg(long)]
    category: Option<CategoryId>,
    /// Include archived problems
    #[arg(long)]
    all: bool,
}

#[derive(Subcommand)]
enum ReportCommand {
    /// Status counts and total points
    Overall,
    /// Completions and durations per category
    Categories,
    /// Activity per user
    Users,
    /// Progress per project
    Projects,
    /// Users ranked by points
    Leaderboard,
    /// Creation-to-completion time per completed problem
    CompletionTimes,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = TallyConfig::load(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir.clone() {
        config.data_dir = data_dir;
    }
    if let Some(policy) = cli.points_policy {
        config.points_policy = policy;
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(data_dir = %config.data_dir.display(), "opening store");
    let storage = Arc::new(JsonStorage::new(&config.data_dir).await?);
    let controller =
        LifecycleController::new(Arc::clone(&storage)).with_config(config.controller());
    let aggregator = Aggregator::new(Arc::clone(&storage)).with_config(config.analytics());

    let json = cli.json;
    match cli.command {
        Commands::User(command) => run_user(&controller, command, json).await?,
        Commands::Category(command) => run_category(&controller, command, json).await?,
        Commands::Project(command) => run_project(&controller, command, json).await?,
        Commands::Problem(command) => run_problem(&controller, command, json).await?,
        Commands::Report(report) => run_report(&aggregator, report, json).await?,
    }

    Ok(())
}

async fn run_user<S: Storage>(
    controller: &LifecycleController<S>,
    command: UserCommand,
    json: bool,
) -> Result<()> {
    match command {
        UserCommand::Add { name } => {
            let user = controller.register_user(&name).await?;
            output::user(&user, json)
        }
        UserCommand::Rename { id, name } => {
            let user = controller.rename_user(id, &name).await?;
            output::user(&user, json)
        }
        UserCommand::List => {
            let users = controller.storage().list_users().await?;
            output::users(&users, json)
        }
    }
}

async fn run_category<S: Storage>(
    controller: &LifecycleController<S>,
    command: CategoryCommand,
    json: bool,
) -> Result<()> {
    match command {
        CategoryCommand::Add { name, points } => {
            let category = controller.add_category(&name, points).await?;
            output::category(&category, json)
        }
        CategoryCommand::SetPoints { id, points } => {
            let category = controller.set_category_points(id, points).await?;
            output::category(&category, json)
        }
        CategoryCommand::List => {
            let categories = controller.storage().list_categories().await?;
            output::categories(&categories, json)
        }
    }
}

async fn run_project<S: Storage>(
    controller: &LifecycleController<S>,
    command: ProjectCommand,
    json: bool,
) -> Result<()> {
    let project = match command {
        ProjectCommand::Create {
            name,
            weeks,
            description,
            members,
        } => {
            controller
                .create_project(ProjectSpec {
                    name,
                    description,
                    planned_weeks: weeks,
                    members,
                })
                .await?
        }
        ProjectCommand::AddMember { project, user } => {
            controller.add_project_member(project, user).await?
        }
        ProjectCommand::Advance { id } => controller.advance_project(id).await?,
        ProjectCommand::Archive { id } => controller.archive_project(id).await?,
        ProjectCommand::List { status, member, all } => {
            let filter = ProjectFilter {
                status: status.map(|s| vec![s]),
                member,
                include_archived: all,
            };
            let projects = controller.list_projects(&filter).await?;
            return output::projects(&projects, json);
        }
    };
    output::project(&project, json)
}

async fn run_problem<S: Storage>(
    controller: &LifecycleController<S>,
    command: ProblemCommand,
    json: bool,
) -> Result<()> {
    let problem = match command {
        ProblemCommand::Create {
            title,
            category,
            project,
            description,
        } => {
            controller
                .create_problem(ProblemSpec {
                    title,
                    description,
                    category_id: category,
                    project_id: project,
                })
                .await?
        }
        ProblemCommand::Claim { id, user } => controller.claim(id, user).await?,
        ProblemCommand::Unclaim { id } => controller.unclaim(id).await?,
        ProblemCommand::Start { id } => controller.start(id).await?,
        ProblemCommand::Complete { id, reference } => match reference {
            Some(reference) => controller.complete_with_reference(id, reference).await?,
            None => controller.complete(id).await?,
        },
        ProblemCommand::Archive { id } => controller.archive_problem(id).await?,
        ProblemCommand::List(args) => {
            let filter = ProblemFilter {
                status: args.status.map(|s| vec![s]),
                project_id: args.project,
                assignee: args.assignee,
                category_id: args.category,
                include_archived: args.all,
            };
            let problems = controller.list_problems(&filter).await?;
            return output::problems(&problems, json);
        }
    };
    output::problem(&problem, json)
}

async fn run_report<A: Analytics>(analytics: &A, report: ReportCommand, json: bool) -> Result<()> {
    match report {
        ReportCommand::Overall => output::overall(&analytics.overall_progress().await?, json),
        ReportCommand::Categories => output::category_report(&analytics.by_category().await?, json),
        ReportCommand::Users => output::user_report(&analytics.by_user().await?, json),
        ReportCommand::Projects => output::project_report(&analytics.by_project().await?, json),
        ReportCommand::Leaderboard => output::leaderboard(&analytics.leaderboard().await?, json),
        ReportCommand::CompletionTimes => {
            output::completion_times(&analytics.completion_times().await?, json)
        }
    }
}

fn normalize(s: &str) -> String {
    s.to_lowercase().replace(['_', '-'], "")
}

fn parse_problem_status(s: &str) -> Result<ProblemStatus, String> {
    match normalize(s).as_str() {
        "open" => Ok(ProblemStatus::Open),
        "claimed" => Ok(ProblemStatus::Claimed),
        "inprogress" => Ok(ProblemStatus::InProgress),
        "completed" => Ok(ProblemStatus::Completed),
        _ => Err(format!("unknown problem status '{}'", s)),
    }
}

fn parse_project_status(s: &str) -> Result<ProjectStatus, String> {
    match normalize(s).as_str() {
        "open" => Ok(ProjectStatus::Open),
        "inprogress" => Ok(ProjectStatus::InProgress),
        "completed" => Ok(ProjectStatus::Completed),
        _ => Err(format!("unknown project status '{}'", s)),
    }
}
