//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::analytics::RoundupPeriod;
use crate::model::Collection;

/// Import command arguments.
#[derive(Debug, Args)]
pub struct ImportCommand {
    /// Collection to replace
    #[arg(value_enum)]
    pub collection: CollectionArg,

    /// JSON file holding an array of records
    pub file: PathBuf,
}

/// Doctor listing arguments.
#[derive(Debug, Args)]
pub struct DoctorsCommand {
    /// Only doctors with this specialization (case-insensitive)
    #[arg(short, long)]
    pub specialization: Option<String>,
}

/// Assignment listing arguments.
#[derive(Debug, Args)]
pub struct AssignmentsCommand {
    /// Only assignments held by this employee
    #[arg(short, long, conflicts_with = "doctor")]
    pub employee: Option<String>,

    /// Only assignments targeting this doctor
    #[arg(short, long)]
    pub doctor: Option<String>,
}

/// Assign command arguments.
#[derive(Debug, Args)]
pub struct AssignCommand {
    /// Employee receiving the assignment
    #[arg(short, long)]
    pub employee: String,

    /// Doctor to visit
    #[arg(short, long)]
    pub doctor: String,

    /// Number of visits expected
    #[arg(short, long)]
    pub target: u32,
}

/// Progress command arguments.
#[derive(Debug, Args)]
pub struct ProgressCommand {
    /// Assignment id
    pub id: String,

    /// Amount to add to the current progress
    #[arg(default_value = "1")]
    pub increment: u32,
}

/// Complete command arguments.
#[derive(Debug, Args)]
pub struct CompleteCommand {
    /// Assignment id
    pub id: String,
}

/// Check-in command arguments.
#[derive(Debug, Args)]
#[command(allow_negative_numbers = true)]
pub struct CheckInCommand {
    /// Employee checking in
    #[arg(short, long)]
    pub employee: String,

    /// Doctor being visited
    #[arg(short, long)]
    pub doctor: String,

    /// Latitude to use instead of the location provider
    #[arg(long, requires = "lng")]
    pub lat: Option<f64>,

    /// Longitude to use instead of the location provider
    #[arg(long, requires = "lat")]
    pub lng: Option<f64>,

    /// Record the check-in even when too far from the doctor
    #[arg(short, long)]
    pub force: bool,

    /// Visit notes
    #[arg(short, long)]
    pub notes: Option<String>,
}

/// Check-in listing arguments.
#[derive(Debug, Args)]
pub struct CheckInsCommand {
    /// Employee whose check-ins to list
    #[arg(short, long)]
    pub employee: String,

    /// Window start (RFC 3339 or YYYY-MM-DD); needs --until
    #[arg(long, requires = "until")]
    pub since: Option<String>,

    /// Window end (RFC 3339 or YYYY-MM-DD, inclusive of the whole day)
    #[arg(long, requires = "since")]
    pub until: Option<String>,
}

/// Distance command arguments.
#[derive(Debug, Args)]
#[command(allow_negative_numbers = true)]
pub struct DistanceCommand {
    /// Latitude of the first point
    pub lat1: f64,
    /// Longitude of the first point
    pub lng1: f64,
    /// Latitude of the second point
    pub lat2: f64,
    /// Longitude of the second point
    pub lng2: f64,
}

/// Analytics command arguments.
#[derive(Debug, Args)]
pub struct AnalyticsCommand {
    /// Only this employee
    #[arg(short, long)]
    pub employee: Option<String>,
}

/// Roundup command arguments.
#[derive(Debug, Args)]
pub struct RoundupCommand {
    /// Reporting period
    #[arg(short, long, value_enum, default_value = "daily")]
    pub period: PeriodArg,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Collection argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CollectionArg {
    /// Employees
    Employees,
    /// Doctors
    Doctors,
    /// Assignments
    Assignments,
    /// Check-ins
    CheckIns,
}

impl From<CollectionArg> for Collection {
    fn from(arg: CollectionArg) -> Self {
        match arg {
            CollectionArg::Employees => Self::Employees,
            CollectionArg::Doctors => Self::Doctors,
            CollectionArg::Assignments => Self::Assignments,
            CollectionArg::CheckIns => Self::CheckIns,
        }
    }
}

/// Roundup period argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum PeriodArg {
    /// Today, local time
    #[default]
    Daily,
    /// The last seven days
    Weekly,
}

impl From<PeriodArg> for RoundupPeriod {
    fn from(arg: PeriodArg) -> Self {
        match arg {
            PeriodArg::Daily => Self::Daily,
            PeriodArg::Weekly => Self::Weekly,
        }
    }
}
