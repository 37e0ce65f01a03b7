use std::fmt;

use chrono::{DateTime, Duration, Utc};
use quiz_core::model::{Profile, QuizAttempt, QuizId, UserId};
use storage::catalog::StaticCatalog;
use storage::repository::{Storage, StorageError};

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    attempts: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidAttempts { raw: String },
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidAttempts { raw } => write!(f, "invalid --attempts value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("QUIZ_DB_URL").unwrap_or_else(|_| "sqlite://quiz.sqlite3?mode=rwc".into());
        let mut attempts = std::env::var("QUIZ_SEED_ATTEMPTS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(4);
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--attempts" => {
                    let value = require_value(&mut args, "--attempts")?;
                    attempts = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidAttempts { raw: value.clone() })?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            attempts,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite://quiz.sqlite3?mode=rwc)");
    eprintln!("  --attempts <n>            Attempts to append per demo player (default: 4)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  QUIZ_DB_URL, QUIZ_SEED_ATTEMPTS");
}

// (username, correct answers out of 3 on each attempt)
const DEMO_PLAYERS: &[(&str, u32)] = &[
    ("QuizMaster", 3),
    ("BrainGenius", 3),
    ("TriviaKing", 2),
    ("QuizWhiz", 2),
    ("KnowledgeNinja", 1),
];

const SEED_QUIZZES: &[(&str, &str)] = &[
    ("science", "science-1"),
    ("geography", "geo-1"),
    ("programming", "prog-1"),
];

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let catalog = StaticCatalog::sample()?;
    let storage = Storage::sqlite(&args.db_url, catalog).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let mut seeded_players = 0_u32;
    let mut seeded_attempts = 0_u32;
    for (username, correct) in DEMO_PLAYERS {
        let user = UserId::random();
        let profile = Profile::new(user, *username, now)?;
        match storage.profiles.insert_profile(&profile).await {
            Ok(()) => seeded_players += 1,
            Err(StorageError::Conflict) => {
                eprintln!("skipping {username}: username already taken");
                continue;
            }
            Err(err) => return Err(err.into()),
        }

        for i in 0..args.attempts {
            let idx = (i as usize) % SEED_QUIZZES.len();
            let (category, quiz) = SEED_QUIZZES[idx];
            let started_at = now - Duration::days(i64::from(i)) - Duration::minutes(10);
            let completed_at = started_at + Duration::minutes(4);
            let attempt = QuizAttempt::from_persisted(
                user,
                QuizId::new(quiz)?,
                category.parse()?,
                *correct,
                3,
                started_at,
                completed_at,
            )?;
            let _ = storage.attempts.append_attempt(&attempt).await?;
            seeded_attempts += 1;
        }
    }

    println!(
        "Seeded {seeded_players} players with {seeded_attempts} attempts into {}",
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
