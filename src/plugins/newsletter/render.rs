//! Subject line and HTML body of a digest email.
//!
//! Rendering is a pure function of the payload: nothing here reads the clock.

use crate::plugins::newsletter::digest::{DigestPayload, ProjectDigest};
use crate::plugins::phase;
use std::fmt::Write;

pub const NO_ACTIVITY_TEXT: &str = "No significant activity this week.";
pub const NO_SESSIONS_TEXT: &str = "No upcoming sessions scheduled.";

/// `6 Jan - 10 Jan 2025`: year only on the end date.
pub fn date_range(payload: &DigestPayload) -> String {
    format!(
        "{} - {}",
        payload.week_start.format("%-d %b"),
        payload.week_end.format("%-d %b %Y")
    )
}

pub fn render_subject(payload: &DigestPayload) -> String {
    match payload.projects.as_slice() {
        [only] => format!("{} - Weekly Update ({})", only.project.name, date_range(payload)),
        projects => format!(
            "Weekly Project Updates - {} Projects ({})",
            projects.len(),
            date_range(payload)
        ),
    }
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn phase_color(phase_id: &str) -> &'static str {
    phase::DEFAULT_PHASES
        .iter()
        .find(|(id, _, _)| *id == phase_id)
        .map(|(_, _, color)| *color)
        .unwrap_or("#6b7280")
}

pub fn render_body(payload: &DigestPayload) -> String {
    let mut html = String::new();
    // Writing to a String cannot fail.
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n\
         <body style=\"font-family: Arial, sans-serif; color: #1f2937; max-width: 640px; margin: 0 auto;\">\n\
         <h1 style=\"font-size: 22px;\">Weekly Project Update</h1>\n\
         <p style=\"color: #6b7280;\">{}</p>\n",
        escape_html(&render_subject(payload)),
        escape_html(&date_range(payload)),
    );
    for project in &payload.projects {
        render_project(&mut html, project);
    }
    html.push_str(
        "<p style=\"color: #9ca3af; font-size: 12px;\">You are receiving this because you subscribed to project updates.</p>\n\
         </body>\n</html>\n",
    );
    html
}

fn render_project(html: &mut String, digest: &ProjectDigest) {
    let project = &digest.project;
    let activity = &digest.weekly_activity;

    let _ = writeln!(
        html,
        "<div class=\"project\" style=\"border: 1px solid #e5e7eb; border-radius: 8px; padding: 16px; margin: 16px 0;\">\n\
         <h2 style=\"font-size: 18px; margin: 0;\">{}</h2>\n\
         <p style=\"color: #6b7280; margin: 4px 0 12px;\">{} &middot; {} &middot; {}</p>",
        escape_html(&project.name),
        escape_html(&project.handover_id),
        escape_html(&project.current_phase),
        escape_html(&project.status),
    );
    if activity.status_changed {
        html.push_str("<p style=\"color: #2563eb;\">Project details were updated this week.</p>\n");
    }

    html.push_str("<table class=\"counters\" style=\"width: 100%; text-align: center;\">\n<tr>\n");
    for (label, count) in [
        ("Tasks completed", activity.tasks_completed),
        ("Issues created", activity.issues_created),
        ("Issues resolved", activity.issues_resolved),
        ("New team members", activity.new_team_members),
        ("New attachments", activity.new_attachments),
    ] {
        let _ = writeln!(
            html,
            "<td><div style=\"font-size: 20px; font-weight: bold;\">{}</div><div style=\"font-size: 12px;\">{}</div></td>",
            count, label
        );
    }
    html.push_str("</tr>\n</table>\n");

    html.push_str("<h3 style=\"font-size: 15px;\">Phase progress</h3>\n");
    for (phase_id, percent) in &digest.phase_progress {
        let _ = writeln!(
            html,
            "<div class=\"phase\">{}: {}%\n\
             <div style=\"background: #e5e7eb; border-radius: 4px; height: 8px;\">\
             <div style=\"background: {}; width: {}%; height: 8px; border-radius: 4px;\"></div></div>\n</div>",
            escape_html(phase_id),
            percent,
            phase_color(phase_id),
            (*percent).min(100),
        );
    }

    html.push_str("<h3 style=\"font-size: 15px;\">What happened this week</h3>\n");
    if activity.is_quiet() {
        let _ = writeln!(html, "<p class=\"quiet\">{}</p>", NO_ACTIVITY_TEXT);
    } else {
        let details = &digest.details;
        render_list(
            html,
            "Completed tasks",
            details
                .tasks_completed
                .iter()
                .map(|i| format!("{} ({})", i.requirement, i.category)),
        );
        if activity.issues_created > 0 {
            let _ = writeln!(html, "<p>{} new issue(s) raised.</p>", activity.issues_created);
        }
        render_list(
            html,
            "Resolved issues",
            details
                .issues_resolved
                .iter()
                .map(|i| format!("{}: {}", i.issue_id, i.title)),
        );
        render_list(
            html,
            "New team members",
            details.new_team_members.iter().map(|c| {
                if c.role.is_empty() {
                    c.name.clone()
                } else {
                    format!("{} - {}", c.name, c.role)
                }
            }),
        );
        render_list(
            html,
            "New attachments",
            details.new_attachments.iter().map(|a| a.original_name.clone()),
        );
    }

    html.push_str("<h3 style=\"font-size: 15px;\">Upcoming events</h3>\n");
    let sessions = &digest.upcoming_events.sessions;
    if sessions.is_empty() {
        let _ = writeln!(html, "<p class=\"no-sessions\">{}</p>", NO_SESSIONS_TEXT);
    } else {
        render_list(
            html,
            "Knowledge sessions",
            sessions.iter().map(|s| {
                format!(
                    "{} {}: {} ({}h)",
                    s.scheduled_date.format("%a %-d %b %Y"),
                    s.start_time,
                    s.topic,
                    s.duration_hours
                )
            }),
        );
    }
    render_list(
        html,
        "Phase dates",
        digest
            .upcoming_events
            .phase_dates
            .iter()
            .filter(|d| d.start_date.is_some() || d.end_date.is_some())
            .map(|d| {
                let fmt = |v: Option<chrono::NaiveDate>| {
                    v.map(|d| d.format("%-d %b %Y").to_string())
                        .unwrap_or_else(|| "TBC".to_string())
                };
                format!("{}: {} - {}", d.phase_id, fmt(d.start_date), fmt(d.end_date))
            }),
    );

    html.push_str("</div>\n");
}

/// `<h4>title</h4><ul>…</ul>`, or nothing at all for an empty list.
fn render_list(html: &mut String, title: &str, entries: impl Iterator<Item = String>) {
    let mut entries = entries.peekable();
    if entries.peek().is_none() {
        return;
    }
    let _ = writeln!(html, "<h4 style=\"font-size: 13px; margin-bottom: 4px;\">{}</h4>\n<ul>", title);
    for entry in entries {
        let _ = writeln!(html, "<li>{}</li>", escape_html(&entry));
    }
    html.push_str("</ul>\n");
}
