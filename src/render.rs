//! Terminal rendering for the agentplan CLI.

use agentplan::{
    Attachment, LogEntry, NextActions, ProjectStatus, ProjectSummary, StatusReport, Ticket, TicketStatus, TicketView,
};
use colored::*;

pub fn ticket_icon(status: TicketStatus) -> ColoredString {
    match status {
        TicketStatus::Pending => "○".normal(),
        TicketStatus::InProgress => "▶".yellow(),
        TicketStatus::Done => "✓".green(),
        TicketStatus::Skipped => "⊘".dimmed(),
    }
}

pub fn project_status(status: ProjectStatus) -> ColoredString {
    match status {
        ProjectStatus::Active => "active".green(),
        ProjectStatus::Paused => "paused".yellow(),
        ProjectStatus::Completed => "completed".blue(),
        ProjectStatus::Abandoned => "abandoned".dimmed(),
    }
}

fn progress(done: usize, total: usize) -> String {
    format!("[{}/{}]", done, total)
}

fn deps_suffix(ticket: &Ticket) -> String {
    if ticket.depends_on.is_empty() {
        String::new()
    } else {
        format!(" (after {})", ticket.depends_on)
    }
}

/// One line per ticket, as shown by `ticket list`.
pub fn ticket_line(ticket: &Ticket) -> String {
    format!(
        "  {} {} {}{}",
        ticket_icon(ticket.status),
        format!("#{}", ticket.num).cyan(),
        ticket.title,
        deps_suffix(ticket).dimmed()
    )
}

fn ticket_view_line(view: &TicketView) -> String {
    let ticket = &view.ticket;
    let icon = if view.blocked { "⏳".red() } else { ticket_icon(ticket.status) };
    let waiting = if view.blocked {
        let nums: Vec<String> = view.waiting_on.iter().map(|n| format!("#{}", n)).collect();
        format!(" waiting on {}", nums.join(", "))
    } else {
        String::new()
    };
    format!(
        "  {} {} {}{}",
        icon,
        format!("#{}", ticket.num).cyan(),
        ticket.title,
        waiting.dimmed()
    )
}

pub fn summary_line(summary: &ProjectSummary) -> String {
    format!(
        "{} {} {} {}",
        summary.slug.cyan(),
        progress(summary.done, summary.total).dimmed(),
        summary.title,
        project_status(summary.status)
    )
}

fn attachment_line(attachment: &Attachment) -> String {
    format!("  {} {}", format!("{}:", attachment.label).bold(), attachment.location())
}

fn log_line(entry: &LogEntry) -> String {
    format!(
        "  {} {}",
        entry.created_at.format("%Y-%m-%d %H:%M").to_string().dimmed(),
        entry.entry
    )
}

pub fn print_status_full(report: &StatusReport) {
    let project = &report.project;
    println!(
        "{} {} {}",
        project.title.bold(),
        format!("({})", project.slug).cyan(),
        project_status(project.status)
    );
    println!("{}: {}", "Progress".bold(), progress(report.done, report.total));
    if let Some(notes) = &project.notes {
        println!("{}: {}", "Notes".bold(), notes);
    }

    if report.tickets.is_empty() {
        println!("{}", "  No tickets".dimmed());
    } else {
        println!("{}:", "Tickets".bold());
        for view in &report.tickets {
            println!("{}", ticket_view_line(view));
            if let Some(notes) = &view.ticket.notes {
                println!("      {}", notes.dimmed());
            }
        }
    }

    if !report.attachments.is_empty() {
        println!("{}:", "Attachments".bold());
        for attachment in &report.attachments {
            println!("{}", attachment_line(attachment));
        }
    }

    if !report.recent_log.is_empty() {
        println!("{}:", "Recent log".bold());
        for entry in &report.recent_log {
            println!("{}", log_line(entry));
        }
    }
}

pub fn print_status_compact(report: &StatusReport) {
    println!("{}", summary_line(&report.summary()));
    let next: Vec<String> = report
        .unblocked_tickets()
        .map(|t| format!("#{} {}", t.num, t.title))
        .collect();
    if !next.is_empty() {
        println!("  {} {}", "→".blue(), next.join(", "));
    }
}

pub fn print_next(actions: &NextActions) {
    println!("{} {}", actions.project.slug.cyan(), actions.project.title.bold());
    for ticket in &actions.tickets {
        println!("{}", ticket_line(ticket));
    }
}
