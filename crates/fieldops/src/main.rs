//! `fieldops` - CLI for the field-operations data core
//!
//! This binary provides the command-line interface for importing records,
//! recording check-ins and reporting employee activity.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::process::ExitCode;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::Parser;
use serde::Serialize;

use fieldops::cli::{
    parse_window_end, parse_window_start, AnalyticsCommand, AssignmentsCommand, CheckInCommand,
    CheckInsCommand, Cli, Command, ConfigCommand, DistanceCommand,
};
use fieldops::geolocation::calculate_distance;
use fieldops::{
    init_logging, App, AssignmentStatus, CheckInOutcome, CheckInRequest, Collection, Config,
    Error, Location,
};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    let json = cli.json;

    // Config and distance never touch the store
    let command = match cli.command {
        Command::Config(config_cmd) => return handle_config(&config, config_cmd, json),
        Command::Distance(cmd) => return handle_distance(&cmd, json),
        command => command,
    };

    let app = if cli.memory {
        App::in_memory(config)
    } else {
        App::open(config).context("failed to open the local store")?
    };

    match command {
        Command::Import(cmd) => {
            let raw = std::fs::read_to_string(&cmd.file)
                .with_context(|| format!("failed to read {}", cmd.file.display()))?;
            let collection = Collection::from(cmd.collection);
            let count = app.import(collection, &raw).await?;
            emit(json, &serde_json::json!({ "collection": collection.as_str(), "imported": count }), || {
                println!("Imported {count} {collection}");
            })?;
        }
        Command::Employees => {
            let employees = app.employees.get_all().await?;
            emit(json, &employees, || {
                for e in &employees {
                    println!("{:<12} {:<24} {}", e.id, e.name, e.email);
                }
            })?;
        }
        Command::Doctors(cmd) => {
            let doctors = match cmd.specialization {
                Some(spec) => app.doctors.get_by_specialization(&spec).await?,
                None => app.doctors.get_all().await?,
            };
            emit(json, &doctors, || {
                for d in &doctors {
                    println!("{:<12} {:<24} {:<16} {}", d.id, d.name, d.specialization, d.location);
                }
            })?;
        }
        Command::Assignments(cmd) => handle_assignments(&app, cmd, json).await?,
        Command::Assign(cmd) => {
            let assignment = app
                .assign(&cmd.employee, &cmd.doctor, cmd.target, Utc::now())
                .await?;
            emit(json, &assignment, || {
                println!("Created assignment {}", assignment.id);
            })?;
        }
        Command::Progress(cmd) => {
            let Some(assignment) = app.assignments.update_progress(&cmd.id, cmd.increment).await?
            else {
                bail!(Error::not_found(Collection::Assignments.as_str(), cmd.id));
            };
            emit(json, &assignment, || {
                println!(
                    "Assignment {}: {}/{}{}",
                    assignment.id,
                    assignment.current_progress,
                    assignment.target,
                    if assignment.is_target_met() { " (target met)" } else { "" }
                );
            })?;
        }
        Command::Complete(cmd) => {
            let Some(assignment) = app
                .assignments
                .update_status(&cmd.id, AssignmentStatus::Completed)
                .await?
            else {
                bail!(Error::not_found(Collection::Assignments.as_str(), cmd.id));
            };
            emit(json, &assignment, || {
                println!("Assignment {} completed", assignment.id);
            })?;
        }
        Command::CheckIn(cmd) => return handle_check_in(&app, cmd, json).await,
        Command::CheckIns(cmd) => handle_check_ins(&app, cmd, json).await?,
        Command::Analytics(cmd) => handle_analytics(&app, cmd, json).await?,
        Command::Roundup(cmd) => {
            let roundup = app.analytics.generate_activity_roundup(cmd.period.into()).await?;
            emit(json, &roundup, || {
                println!("Roundup {} ({})", roundup.id, roundup.period);
                println!("  Window:           {} .. {}", roundup.window_start, roundup.window_end);
                println!("  Check-ins:        {}", roundup.total_check_ins);
                println!("  Active employees: {}", roundup.active_employees);
                for e in &roundup.employees {
                    println!(
                        "  {:<12} {:<24} check-ins {:>3}  targets met {:>3}  doctors {}",
                        e.employee_id,
                        e.employee_name,
                        e.check_ins,
                        e.targets_achieved,
                        e.doctors_visited.join(",")
                    );
                }
            })?;
        }
        Command::Config(_) | Command::Distance(_) => unreachable!("handled before opening the store"),
    }

    Ok(ExitCode::SUCCESS)
}

/// Print `value` as JSON, or run `plain` for human-readable output.
fn emit<T: Serialize + ?Sized>(json: bool, value: &T, plain: impl FnOnce()) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        plain();
    }
    Ok(())
}

fn handle_distance(cmd: &DistanceCommand, json: bool) -> anyhow::Result<ExitCode> {
    let a = Location::new(cmd.lat1, cmd.lng1);
    let b = Location::new(cmd.lat2, cmd.lng2);
    if !a.is_valid() || !b.is_valid() {
        bail!("coordinates out of range");
    }
    let meters = calculate_distance(a, b);
    emit(json, &serde_json::json!({ "from": a, "to": b, "meters": meters }), || {
        println!("{meters:.1} m");
    })?;
    Ok(ExitCode::SUCCESS)
}

async fn handle_assignments(app: &App, cmd: AssignmentsCommand, json: bool) -> anyhow::Result<()> {
    let assignments = match (cmd.employee, cmd.doctor) {
        (Some(employee), _) => app.assignments.get_by_employee(&employee).await?,
        (None, Some(doctor)) => app.assignments.get_by_doctor(&doctor).await?,
        (None, None) => app.assignments.get_all().await?,
    };
    emit(json, &assignments, || {
        for a in &assignments {
            println!(
                "{:<38} {:<12} {:<12} {:>4}/{:<4} {:?}",
                a.id, a.employee_id, a.doctor_id, a.current_progress, a.target, a.status
            );
        }
    })
}

/// Exits with status 2 when the check-in is rejected as out of range.
async fn handle_check_in(app: &App, cmd: CheckInCommand, json: bool) -> anyhow::Result<ExitCode> {
    let request = CheckInRequest {
        employee_id: cmd.employee,
        doctor_id: cmd.doctor,
        location: cmd.lat.zip(cmd.lng).map(|(lat, lng)| Location::new(lat, lng)),
        force: cmd.force,
        notes: cmd.notes,
    };

    let outcome = match app.check_in(request, Utc::now()).await {
        Ok(outcome) => outcome,
        Err(err) if err.is_permission_error() => {
            bail!("{err}; grant location access or pass --lat/--lng")
        }
        Err(err) if err.is_location_unavailable() => {
            bail!("{err}; set geolocation.simulated_location or pass --lat/--lng")
        }
        Err(err) => return Err(err.into()),
    };

    emit(json, &outcome, || match &outcome {
        CheckInOutcome::Recorded { check_in, proximity } => {
            println!(
                "Checked in {} at {} ({:.1} m from doctor)",
                check_in.id, check_in.timestamp, proximity.distance_meters
            );
        }
        CheckInOutcome::OutOfRange { proximity } => {
            println!(
                "Too far from doctor: {:.1} m (allowed {:.1} m). Use --force to record anyway.",
                proximity.distance_meters, proximity.radius_meters
            );
        }
    })?;

    Ok(match outcome {
        CheckInOutcome::Recorded { .. } => ExitCode::SUCCESS,
        CheckInOutcome::OutOfRange { .. } => ExitCode::from(2),
    })
}

async fn handle_check_ins(app: &App, cmd: CheckInsCommand, json: bool) -> anyhow::Result<()> {
    let start = cmd.since.as_deref().map(parse_window_start).transpose()?;
    let end = cmd.until.as_deref().map(parse_window_end).transpose()?;
    let check_ins = app.check_ins.get_by_employee(&cmd.employee, start, end).await?;
    emit(json, &check_ins, || {
        for c in &check_ins {
            println!(
                "{:<38} {:<12} {}  {}",
                c.id,
                c.doctor_id,
                c.timestamp.to_rfc3339(),
                c.notes.as_deref().unwrap_or("")
            );
        }
    })
}

async fn handle_analytics(app: &App, cmd: AnalyticsCommand, json: bool) -> anyhow::Result<()> {
    let analytics = match cmd.employee {
        Some(id) => vec![app.analytics.get_employee_analytics(&id).await?],
        None => app.analytics.get_all_employees_analytics().await?,
    };
    emit(json, &analytics, || {
        for a in &analytics {
            println!("{} ({})", a.employee_name, a.employee_id);
            println!(
                "  Assignments:       {} ({} completed)",
                a.total_assignments, a.completed_assignments
            );
            println!("  Check-ins:         {}", a.total_check_ins);
            println!("  Per day (30d):     {:.2}", a.average_check_ins_per_day);
            println!(
                "  Last check-in:     {}",
                a.last_check_in.map_or_else(|| "never".to_string(), |t| t.to_rfc3339())
            );
            println!("  Target achieved:   {:.1}%", a.target_achievement_rate);
        }
    })
}

fn handle_config(config: &Config, cmd: ConfigCommand, json: bool) -> anyhow::Result<ExitCode> {
    match cmd {
        ConfigCommand::Show => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!("  Key prefix:         {}", config.storage.key_prefix);
                println!();
                println!("[Geolocation]");
                println!(
                    "  Check-in radius:    {} m",
                    config.geolocation.check_in_radius_meters
                );
                println!(
                    "  Simulated location: {}",
                    config
                        .geolocation
                        .simulated_location
                        .map_or_else(|| "none".to_string(), |l| l.to_string())
                );
                println!();
                println!("[Analytics]");
                println!("  Admin id:           {}", config.analytics.admin_id);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => bail!("Configuration error: {e}"),
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
