//! `tally`, the command-line client for the Tally lending ledger.
//!
//! # Usage
//!
//! ```text
//! tally --url http://localhost:5000 resources --kind book
//! tally assign <resource-id> <subject-id> --due 2024-09-15
//! tally return <assignment-id>
//! tally overdue
//! ```

mod client;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use client::ApiClient;
use serde::Deserialize;
use tally_core::{
  assignment::AssignmentView,
  resource::{Resource, ResourceDetails, ResourceKind},
  subject::Subject,
};
use tracing::level_filters::LevelFilter;
use uuid::Uuid;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "tally", about = "Command-line client for the Tally ledger")]
struct Args {
  /// Path to a TOML config file (url).
  #[arg(short, long, value_name = "FILE")]
  config: Option<std::path::PathBuf>,

  /// Base URL of the tally server (default: http://localhost:5000).
  #[arg(long, env = "TALLY_URL")]
  url: Option<String>,

  /// Log HTTP traffic to stderr.
  #[arg(short, long)]
  verbose: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List resources, newest first.
  Resources {
    #[arg(long)]
    kind: Option<ResourceKind>,
  },
  /// Show one resource and who currently holds its units.
  Resource { id: Uuid },
  /// List subjects.
  Subjects,
  /// Assign one unit of a resource to a subject.
  Assign {
    resource: Uuid,
    subject:  Uuid,
    /// Start date (YYYY-MM-DD); defaults to today on the server.
    #[arg(long)]
    start:    Option<NaiveDate>,
    /// Due date (YYYY-MM-DD); required for book loans.
    #[arg(long)]
    due:      Option<NaiveDate>,
  },
  /// Close an assignment and free its unit.
  Return {
    assignment: Uuid,
    /// Return date (YYYY-MM-DD); defaults to today on the server.
    #[arg(long)]
    date:       Option<NaiveDate>,
  },
  /// List open assignments whose due date has passed.
  Overdue,
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url: String,
}

// ─── Rendering ────────────────────────────────────────────────────────────────

fn resource_label(details: &ResourceDetails) -> String {
  match details {
    ResourceDetails::Book(b) => format!("{} by {}", b.title, b.author),
    ResourceDetails::Bus(b) => format!("{} ({}, {})", b.bus_number, b.route, b.driver_name),
  }
}

fn resource_line(r: &Resource) -> String {
  format!(
    "{}  {:<4}  {:>3}/{:<3}  {}",
    r.resource_id,
    r.kind(),
    r.available_units,
    r.total_units,
    resource_label(&r.details)
  )
}

fn subject_line(s: &Subject) -> String {
  let mut line = format!("{}  {}", s.subject_id, s.name);
  if let Some(roll) = &s.roll_number {
    line.push_str(&format!("  #{roll}"));
  }
  if let Some(class) = &s.class_name {
    line.push_str(&format!("  [{class}]"));
  }
  line
}

fn assignment_line(v: &AssignmentView) -> String {
  let a = &v.assignment;
  let due = a
    .due_date
    .map_or_else(|| "-".to_owned(), |d| d.to_string());
  format!(
    "{}  resource {}  subject {}  from {}  due {}  {:?}",
    a.assignment_id, a.resource_id, a.subject_id, a.start_date, due, v.standing
  )
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  if args.verbose {
    tracing_subscriber::fmt()
      .with_max_level(LevelFilter::DEBUG)
      .with_writer(std::io::stderr)
      .init();
  }

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flag / env override config file, which overrides the default.
  let base_url = args
    .url
    .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
    .unwrap_or_else(|| "http://localhost:5000".to_string());

  let client = ApiClient::new(base_url)?;

  match args.command {
    Command::Resources { kind } => {
      for r in client.list_resources(kind).await? {
        println!("{}", resource_line(&r));
      }
    }
    Command::Resource { id } => {
      let resource = client.get_resource(id).await?;
      println!("{}", resource_line(&resource));
      for v in client.resource_assignments(id).await? {
        println!("  {}", assignment_line(&v));
      }
    }
    Command::Subjects => {
      for s in client.list_subjects().await? {
        println!("{}", subject_line(&s));
      }
    }
    Command::Assign { resource, subject, start, due } => {
      let view = client.assign(resource, subject, start, due).await?;
      println!("{}", assignment_line(&view));
    }
    Command::Return { assignment, date } => {
      let view = client.close(assignment, date).await?;
      println!("{}", assignment_line(&view));
    }
    Command::Overdue => {
      let overdue = client.overdue().await?;
      if overdue.is_empty() {
        println!("nothing overdue");
      }
      for v in overdue {
        println!("{}", assignment_line(&v));
      }
    }
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use tally_core::resource::{BusDetails, BusStatus};

  use super::*;

  #[test]
  fn bus_line_shows_seats_and_route() {
    let bus = Resource {
      resource_id:     Uuid::nil(),
      details:         ResourceDetails::Bus(BusDetails {
        bus_number:   "BUS-002".into(),
        driver_name:  "Maria Garcia".into(),
        driver_phone: None,
        route:        "South Route".into(),
        status:       BusStatus::Active,
      }),
      total_units:     35,
      available_units: 12,
      created_at:      Utc::now(),
    };
    let line = resource_line(&bus);
    assert!(line.contains(" 12/35 "), "{line}");
    assert!(line.contains("BUS-002 (South Route, Maria Garcia)"), "{line}");
  }

  #[test]
  fn parses_assign_with_dates() {
    let args = Args::try_parse_from([
      "tally",
      "assign",
      "00000000-0000-0000-0000-000000000001",
      "00000000-0000-0000-0000-000000000002",
      "--due",
      "2024-09-15",
    ])
    .unwrap();
    let Command::Assign { due, start, .. } = args.command else {
      panic!("expected assign");
    };
    assert_eq!(due, NaiveDate::from_ymd_opt(2024, 9, 15));
    assert_eq!(start, None);
  }

  #[test]
  fn rejects_unknown_kind() {
    assert!(Args::try_parse_from(["tally", "resources", "--kind", "van"]).is_err());
  }
}
