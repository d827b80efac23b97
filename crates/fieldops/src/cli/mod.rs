//! Command-line interface for fieldops.
//!
//! This module provides the CLI structure and argument helpers for the
//! `fieldops` binary.

mod commands;

use std::path::PathBuf;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use clap::{Parser, Subcommand};

pub use commands::{
    AnalyticsCommand, AssignCommand, AssignmentsCommand, CheckInCommand, CheckInsCommand,
    CollectionArg, CompleteCommand, ConfigCommand, DistanceCommand, DoctorsCommand, ImportCommand,
    PeriodArg, ProgressCommand, RoundupCommand,
};

use crate::error::{Error, Result};

/// fieldops - Check-ins, assignments and analytics for field staff
///
/// Keeps field-operations records in a local store, validates check-ins
/// against the doctor's location, and reports per-employee activity.
#[derive(Debug, Parser)]
#[command(name = "fieldops")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Use a throwaway in-memory store instead of the database
    #[arg(long, global = true)]
    pub memory: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Replace a collection with records from a JSON file
    Import(ImportCommand),

    /// List employees
    Employees,

    /// List doctors
    Doctors(DoctorsCommand),

    /// List assignments
    Assignments(AssignmentsCommand),

    /// Create an assignment
    Assign(AssignCommand),

    /// Add progress to an assignment
    Progress(ProgressCommand),

    /// Mark an assignment completed
    Complete(CompleteCommand),

    /// Check an employee in at a doctor
    CheckIn(CheckInCommand),

    /// List an employee's check-ins
    CheckIns(CheckInsCommand),

    /// Great-circle distance between two points in meters
    Distance(DistanceCommand),

    /// Show employee analytics
    Analytics(AnalyticsCommand),

    /// Generate an activity roundup
    Roundup(RoundupCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}

/// Parse the start of a time window.
///
/// Accepts RFC 3339 or a bare `YYYY-MM-DD`, which means midnight UTC.
///
/// # Errors
///
/// Returns [`Error::InvalidTimestamp`] if `value` matches neither form.
pub fn parse_window_start(value: &str) -> Result<DateTime<Utc>> {
    parse_bound(value, false)
}

/// Parse the end of a time window.
///
/// A bare `YYYY-MM-DD` covers the whole day, ending at 23:59:59.999 UTC.
///
/// # Errors
///
/// Returns [`Error::InvalidTimestamp`] if `value` matches neither form.
pub fn parse_window_end(value: &str) -> Result<DateTime<Utc>> {
    parse_bound(value, true)
}

fn parse_bound(value: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(timestamp.with_timezone(&Utc));
    }

    let invalid = || Error::InvalidTimestamp {
        value: value.to_string(),
    };
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| invalid())?;
    let start = date.and_hms_opt(0, 0, 0).ok_or_else(invalid)?.and_utc();
    if end_of_day {
        Ok(start + Duration::days(1) - Duration::milliseconds(1))
    } else {
        Ok(start)
    }
}
