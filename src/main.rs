use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::{Local, NaiveDate, TimeDelta};
use clap::{Parser, Subcommand};
use serde::Serialize;

use study_advisor::logging::{init_tracing, LogSettings};
use study_advisor::{
    parse_timestamp, session_end, AdvisorConfig, JsonFileStore, NoModelReason, QuizRecord, RetrainOutcome,
    StudyAdvisor, StudySession,
};

#[derive(Parser)]
#[command(
    name = "study-advisor",
    about = "Suggest how to split study time across activity types",
    version
)]
struct Cli {
    /// Data directory (default: $STUDY_ADVISOR_DATA_DIR or the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Print JSON instead of plain text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record a finished study session
    LogSession {
        course: String,
        /// Activity type, e.g. "Questions"
        study_type: String,
        /// Length of the session in minutes
        #[arg(long)]
        minutes: f64,
        /// Start time (defaults to now minus the session length)
        #[arg(long)]
        start: Option<String>,
        /// To-do item the session was spent on
        #[arg(long)]
        name: Option<String>,
    },

    /// Record a quiz score and retrain
    AddQuiz {
        course: String,
        /// Quiz date, YYYY-MM-DD
        date: NaiveDate,
        score: f64,
    },

    /// Delete the quiz at a position in the date-sorted listing and retrain
    DeleteQuiz { course: String, index: usize },

    /// List quiz scores by date
    Quizzes { course: String },

    /// Mean quiz score per day
    Averages {
        course: String,
        /// Only include dates on or after this one
        #[arg(long)]
        since: Option<NaiveDate>,
    },

    /// Rebuild the course model from its full history
    Retrain { course: String },

    /// Suggested hours per activity type
    Suggest {
        course: String,
        /// Time budget in hours (default from configuration)
        #[arg(long)]
        hours: Option<f64>,
    },

    /// Report numerical health of the stored model
    Diagnose { course: String },
}

fn data_dir(cli_value: Option<PathBuf>) -> PathBuf {
    cli_value
        .or_else(|| std::env::var_os("STUDY_ADVISOR_DATA_DIR").map(PathBuf::from))
        .or_else(|| dirs::data_dir().map(|d| d.join("study-advisor")))
        .unwrap_or_else(|| PathBuf::from("./data"))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_outcome(outcome: &RetrainOutcome, json: bool) -> anyhow::Result<()> {
    match outcome {
        RetrainOutcome::Trained { report, .. } if json => print_json(report),
        RetrainOutcome::Trained { report, .. } => {
            println!(
                "trained on {} quizzes ({} skipped), {} activity types x {} = {} features",
                report.samples_used,
                report.samples_skipped,
                report.activity_types.len(),
                report.dimension / report.activity_types.len().max(1),
                report.dimension
            );
            Ok(())
        }
        RetrainOutcome::NoModel(reason) if json => {
            print_json(&serde_json::json!({ "model": null, "reason": reason }))
        }
        RetrainOutcome::NoModel(NoModelReason::NoQuizzes) => {
            println!("no quiz scores yet, model removed");
            Ok(())
        }
        RetrainOutcome::NoModel(NoModelReason::NoActivity) => {
            println!("no study sessions before any quiz, model removed");
            Ok(())
        }
    }
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let _log_guard = init_tracing(&LogSettings::from_env("warn"));

    let cli = Cli::parse();
    let root = data_dir(cli.data_dir);
    let advisor = StudyAdvisor::new(AdvisorConfig::from_env(), JsonFileStore::new(&root))
        .context("invalid configuration")?;
    advisor
        .ensure_default_activity_types()
        .with_context(|| format!("cannot prepare data directory {}", root.display()))?;

    match cli.command {
        Command::LogSession {
            course,
            study_type,
            minutes,
            start,
            name,
        } => {
            if !(minutes.is_finite() && minutes > 0.0) {
                bail!("session length must be a positive number of minutes");
            }
            let seconds = minutes * 60.0;
            let start = match start {
                Some(raw) => parse_timestamp(&raw)
                    .with_context(|| format!("unrecognized start time {raw:?}"))?,
                None => {
                    let now = Local::now().naive_local();
                    let Some(start) = TimeDelta::try_seconds(seconds.round() as i64)
                        .and_then(|delta| now.checked_sub_signed(delta))
                    else {
                        bail!("session length of {minutes} min is out of range");
                    };
                    start
                }
            };
            if session_end(start, seconds).is_none() {
                bail!("session length of {minutes} min is out of range");
            }
            let mut session = StudySession::new(course, study_type, start, seconds);
            session.name = name;
            advisor.log_session(session)?;
            if !cli.json {
                println!("recorded {minutes} min");
            }
        }
        Command::AddQuiz {
            course,
            date,
            score,
        } => {
            if !score.is_finite() {
                bail!("score must be a finite number");
            }
            let outcome = advisor.add_quiz(&course, QuizRecord::new(date, score))?;
            print_outcome(&outcome, cli.json)?;
        }
        Command::DeleteQuiz { course, index } => {
            let (removed, outcome) = advisor.delete_quiz(&course, index)?;
            if !cli.json {
                println!("deleted {} ({})", removed.date, removed.score);
            }
            print_outcome(&outcome, cli.json)?;
        }
        Command::Quizzes { course } => {
            let quizzes = advisor.list_quizzes(&course)?;
            if cli.json {
                print_json(&quizzes)?;
            } else {
                for (i, quiz) in quizzes.iter().enumerate() {
                    println!("{i:>4}  {}  {:.1}", quiz.date, quiz.score);
                }
            }
        }
        Command::Averages { course, since } => {
            let averages = advisor.quiz_daily_averages(&course, since)?;
            if cli.json {
                print_json(&averages)?;
            } else {
                for avg in &averages {
                    println!("{}  {:.2}  (n={})", avg.date, avg.mean_score, avg.count);
                }
            }
        }
        Command::Retrain { course } => {
            let outcome = advisor.retrain(&course)?;
            print_outcome(&outcome, cli.json)?;
        }
        Command::Suggest { course, hours } => {
            let budget = hours.unwrap_or(advisor.config().default_budget_hours);
            let allocation = advisor.suggest_allocation(&course, budget);
            if cli.json {
                print_json(&allocation)?;
            } else {
                for (label, h) in allocation.labels.iter().zip(allocation.hours.iter()) {
                    println!("{label:<20} {h:>6.2} h");
                }
            }
        }
        Command::Diagnose { course } => match advisor.diagnose(&course)? {
            Some(result) if cli.json => print_json(&result)?,
            Some(result) => println!(
                "{} (condition {:.2e}, P diagonal {:.2e}..{:.2e})",
                result.message, result.condition_number, result.min_diagonal, result.max_diagonal
            ),
            None => println!("no model for {course}"),
        },
    }

    Ok(())
}
