//! agentplan CLI - project and ticket tracking for AI agents.

use agentplan::{
    Config, DependencySet, ProjectStatus, Store, StoreBatchExt, StoreError, StoreReportExt, TicketStatus,
    TransitionReport,
};
use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

mod cli;
mod render;

use cli::{Cli, Command, ProjectFilter, StatusFormat, TicketCommand, TicketFilter};

/// Exit code when a query has nothing to show.
const EXIT_EMPTY: u8 = 1;

/// Exit code for any failed command.
const EXIT_ERROR: u8 = 2;

fn setup_logging() -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("agentplan")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("agentplan.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

/// Whether a command produced output or found nothing.
enum Outcome {
    Shown,
    Empty,
}

fn project_filter(filter: ProjectFilter) -> Option<ProjectStatus> {
    match filter {
        ProjectFilter::Active => Some(ProjectStatus::Active),
        ProjectFilter::Paused => Some(ProjectStatus::Paused),
        ProjectFilter::Completed => Some(ProjectStatus::Completed),
        ProjectFilter::Abandoned => Some(ProjectStatus::Abandoned),
        ProjectFilter::All => None,
    }
}

fn ticket_filter(filter: TicketFilter) -> Option<TicketStatus> {
    match filter {
        TicketFilter::Pending => Some(TicketStatus::Pending),
        TicketFilter::InProgress => Some(TicketStatus::InProgress),
        TicketFilter::Done => Some(TicketStatus::Done),
        TicketFilter::Skipped => Some(TicketStatus::Skipped),
        TicketFilter::All => None,
    }
}

fn print_serialized<T: Serialize + ?Sized>(value: &T, format: StatusFormat) -> Result<()> {
    match format {
        StatusFormat::Yaml => print!("{}", serde_yaml::to_string(value).context("Failed to encode YAML")?),
        _ => println!("{}", serde_json::to_string_pretty(value).context("Failed to encode JSON")?),
    }
    Ok(())
}

fn print_transition(report: &TransitionReport, verb: &str, slug: &str) {
    for change in &report.changes {
        let ticket = &change.ticket;
        if change.changed {
            println!(
                "{} {} {} {}",
                render::ticket_icon(ticket.status),
                verb,
                format!("#{}", ticket.num).cyan(),
                ticket.title
            );
        } else {
            println!(
                "{} {} already {}",
                "·".dimmed(),
                format!("#{}", ticket.num).cyan(),
                ticket.status
            );
        }
    }
    if report.project_completed {
        println!("{} Project {} completed", "✓".green(), slug.cyan());
    }
}

fn run(cli: Cli) -> Result<Outcome> {
    let config = Config::resolve(cli.dir, cli.db);
    info!("Using database: {}", config.db_path.display());

    let open_store = || Store::open(&config).context("Failed to open store");

    match cli.command {
        Command::Version => {
            println!("agentplan {}", env!("GIT_DESCRIBE"));
        }

        Command::Init => {
            open_store()?;
            println!("{} Initialized agentplan at {}", "✓".green(), config.db_path.display());
        }

        Command::Create { title, tickets, notes } => {
            let titles: Vec<&str> = tickets.iter().map(|s| s.as_str()).collect();
            let (project, tickets) = open_store()?.create_project(&title, notes.as_deref(), &titles)?;

            println!("{} Created: {} {}", "✓".green(), project.slug.cyan(), project.title);
            for ticket in &tickets {
                println!("{}", render::ticket_line(ticket));
            }
        }

        Command::Ticket(command) => return run_ticket(&mut open_store()?, command),

        Command::Next { project } => {
            let actions = open_store()?.next_actions(project.as_deref())?;
            if actions.is_empty() {
                println!("{}", "Nothing to work on".dimmed());
                return Ok(Outcome::Empty);
            }
            for (i, next) in actions.iter().enumerate() {
                if i > 0 {
                    println!();
                }
                render::print_next(next);
            }
        }

        Command::Status { project, format } => {
            let store = open_store()?;
            let reports = match project {
                Some(ident) => vec![store.status_report(&ident)?],
                None => store.active_status_reports()?,
            };
            if reports.is_empty() {
                println!("{}", "No active projects".dimmed());
                return Ok(Outcome::Empty);
            }

            match format {
                StatusFormat::Json | StatusFormat::Yaml => match reports.as_slice() {
                    [single] => print_serialized(single, format)?,
                    many => print_serialized(many, format)?,
                },
                StatusFormat::Compact => reports.iter().for_each(render::print_status_compact),
                StatusFormat::Full => {
                    for (i, report) in reports.iter().enumerate() {
                        if i > 0 {
                            println!();
                        }
                        render::print_status_full(report);
                    }
                }
            }
        }

        Command::List { status } => {
            let summaries = open_store()?.summaries(project_filter(status))?;
            if summaries.is_empty() {
                println!("{}", "No projects found".dimmed());
                return Ok(Outcome::Empty);
            }
            for summary in &summaries {
                println!("{}", render::summary_line(summary));
            }
        }

        Command::Attach {
            project,
            label,
            location,
            ticket,
        } => {
            let attachment = open_store()?.attach(&project, &label, &location, ticket)?;
            println!(
                "{} Attached {} {}",
                "✓".green(),
                attachment.label.bold(),
                attachment.location()
            );
        }

        Command::Log { project, entry, ticket } => {
            open_store()?.log(&project, &entry, ticket)?;
            println!("{} Logged to {}", "✓".green(), project.cyan());
        }

        Command::Close { project, abandon } => {
            let status = if abandon {
                ProjectStatus::Abandoned
            } else {
                ProjectStatus::Completed
            };
            let project = open_store()?.set_project_status(&project, status)?;
            println!("{} {} {}", "✓".green(), project.slug.cyan(), render::project_status(project.status));
        }

        Command::Pause { project } => {
            let project = open_store()?.set_project_status(&project, ProjectStatus::Paused)?;
            println!("{} Paused {}", "⏸".yellow(), project.slug.cyan());
        }

        Command::Resume { project } => {
            let project = open_store()?.set_project_status(&project, ProjectStatus::Active)?;
            println!("{} Resumed {}", "▶".green(), project.slug.cyan());
        }

        Command::Note { project, text, ticket } => {
            open_store()?.set_note(&project, ticket, &text)?;
            match ticket {
                Some(num) => println!("{} Note set on {} {}", "✓".green(), project.cyan(), format!("#{}", num).cyan()),
                None => println!("{} Note set on {}", "✓".green(), project.cyan()),
            }
        }

        Command::Depend { project, ticket, on } => {
            let deps: DependencySet = on.into_iter().collect();
            let ticket = open_store()?.add_dependency(&project, ticket, &deps)?;
            println!(
                "{} {} now depends on {}",
                "✓".green(),
                format!("#{}", ticket.num).cyan(),
                ticket.depends_on
            );
        }

        Command::Remove { project, ticket } => {
            let mut store = open_store()?;
            match ticket {
                Some(num) => {
                    let ticket = store.remove_ticket(&project, num)?;
                    println!("{} Removed {} {}", "✓".green(), format!("#{}", ticket.num).cyan(), ticket.title);
                }
                None => {
                    let project = store.remove_project(&project)?;
                    println!("{} Removed project {}", "✓".green(), project.slug.cyan());
                }
            }
        }
    }

    Ok(Outcome::Shown)
}

fn run_ticket(store: &mut Store, command: TicketCommand) -> Result<Outcome> {
    match command {
        TicketCommand::Add {
            project,
            title,
            depends,
            notes,
        } => {
            let deps: DependencySet = depends.into_iter().collect();
            let ticket = store.add_ticket(&project, &title, &deps, notes.as_deref())?;
            println!("{} Added {}", "✓".green(), render::ticket_line(&ticket).trim_start());
        }

        TicketCommand::Done { project, tickets } => {
            let report = store.batch_done(&project, &tickets)?;
            print_transition(&report, "Done", &project);
        }

        TicketCommand::Skip { project, tickets } => {
            let report = store.batch_skip(&project, &tickets)?;
            print_transition(&report, "Skipped", &project);
        }

        TicketCommand::Start { project, ticket } => {
            let report = store.start_ticket(&project, ticket)?;
            print_transition(&report, "Started", &project);
        }

        TicketCommand::List { project, status } => {
            let tickets = store.list_tickets(&project, ticket_filter(status))?;
            if tickets.is_empty() {
                println!("{}", "No tickets found".dimmed());
                return Ok(Outcome::Empty);
            }
            for ticket in &tickets {
                println!("{}", render::ticket_line(ticket));
            }
        }
    }

    Ok(Outcome::Shown)
}

/// Process exit status for a finished command; logs the failure if there is one.
fn exit_status(result: &Result<Outcome>) -> u8 {
    match result {
        Ok(Outcome::Shown) => 0,
        Ok(Outcome::Empty) => EXIT_EMPTY,
        Err(e) => {
            match e.downcast_ref::<StoreError>() {
                Some(store_error) => log::warn!("Command rejected: {:?}", store_error),
                None => log::error!("Command failed: {:?}", e),
            }
            EXIT_ERROR
        }
    }
}

fn main() -> ExitCode {
    if let Err(e) = setup_logging() {
        eprintln!("{} {:#}", "Warning:".yellow().bold(), e);
    }

    let cli = Cli::parse();
    info!("Command: {:?}", std::env::args().collect::<Vec<_>>());

    let result = run(cli);
    if let Err(e) = &result {
        eprintln!("{} {}", "Error:".red().bold(), e);
    }
    ExitCode::from(exit_status(&result))
}
