use std::fmt;

use quiz_core::model::{CategoryId, QuizId, UserId};
use services::{AppServices, AuthError, Clock, IdentityBackend};
use tracing_subscriber::EnvFilter;

mod terminal;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArgument { name: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidDbUrl { raw: String },
    InvalidLimit { raw: String },
    InvalidId { raw: String },
    MissingUser,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArgument { name } => write!(f, "missing <{name}> argument"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidLimit { raw } => write!(f, "invalid limit value: {raw}"),
            ArgsError::InvalidId { raw } => write!(f, "invalid identifier: {raw}"),
            ArgsError::MissingUser => write!(f, "this command requires --user <email>"),
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

fn parse_limit(raw: String) -> Result<u32, ArgsError> {
    raw.parse::<u32>()
        .map_err(|_| ArgsError::InvalidLimit { raw: raw.clone() })
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Categories,
    Quizzes { category: CategoryId },
    Play { category: CategoryId, quiz: QuizId },
    Progress,
    Leaderboard,
}

#[derive(Debug, Clone)]
struct Credentials {
    email: String,
    password: String,
    username: Option<String>,
}

#[derive(Debug)]
struct Args {
    db_url: String,
    command: Command,
    credentials: Option<Credentials>,
    limit: u32,
    recent: u32,
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- categories");
    eprintln!("  cargo run -p app -- quizzes <category>");
    eprintln!("  cargo run -p app -- play <category> <quiz> [--user <email>]");
    eprintln!("  cargo run -p app -- progress --user <email> [--recent <n>]");
    eprintln!("  cargo run -p app -- leaderboard [--limit <n>]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite://quiz.sqlite3)");
    eprintln!("  --user <email>            Sign in as this account");
    eprintln!("  --password <password>     Account password");
    eprintln!("  --username <name>         Username for a new account (development auth)");
    eprintln!("  --limit <n>               Leaderboard size (default: 10)");
    eprintln!("  --recent <n>              Recent attempts to list (default: 5)");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DB_URL, QUIZ_USER_EMAIL, QUIZ_USER_PASSWORD");
    eprintln!("  QUIZ_AUTH_URL, QUIZ_AUTH_KEY   hosted identity provider (else development)");
    eprintln!("  QUIZ_LOG                       log filter (default: info)");
}

impl Args {
    fn parse(args: impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = normalize_sqlite_url(
            std::env::var("QUIZ_DB_URL").unwrap_or_else(|_| "quiz.sqlite3".into()),
        );
        let mut email = std::env::var("QUIZ_USER_EMAIL").ok();
        let mut password = std::env::var("QUIZ_USER_PASSWORD").ok();
        let mut username = None;
        let mut limit = 10;
        let mut recent = 5;
        let mut positional = Vec::new();

        let mut args = args;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--user" => email = Some(require_value(&mut args, "--user")?),
                "--password" => password = Some(require_value(&mut args, "--password")?),
                "--username" => username = Some(require_value(&mut args, "--username")?),
                "--limit" => limit = parse_limit(require_value(&mut args, "--limit")?)?,
                "--recent" => recent = parse_limit(require_value(&mut args, "--recent")?)?,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                flag if flag.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        let command = match positional.next().as_deref() {
            None | Some("categories") => Command::Categories,
            Some("quizzes") => Command::Quizzes {
                category: category_arg(positional.next())?,
            },
            Some("play") => Command::Play {
                category: category_arg(positional.next())?,
                quiz: positional
                    .next()
                    .ok_or(ArgsError::MissingArgument { name: "quiz" })
                    .and_then(|raw| {
                        QuizId::new(raw.clone()).map_err(|_| ArgsError::InvalidId { raw })
                    })?,
            },
            Some("progress") => Command::Progress,
            Some("leaderboard") => Command::Leaderboard,
            Some(other) => return Err(ArgsError::UnknownCommand(other.to_string())),
        };
        if let Some(extra) = positional.next() {
            return Err(ArgsError::UnknownArg(extra));
        }

        let credentials = email.map(|email| Credentials {
            email,
            password: password.unwrap_or_default(),
            username,
        });
        if command == Command::Progress && credentials.is_none() {
            return Err(ArgsError::MissingUser);
        }

        Ok(Self {
            db_url,
            command,
            credentials,
            limit,
            recent,
        })
    }
}

fn category_arg(raw: Option<String>) -> Result<CategoryId, ArgsError> {
    let raw = raw.ok_or(ArgsError::MissingArgument { name: "category" })?;
    CategoryId::new(raw.clone()).map_err(|_| ArgsError::InvalidId { raw })
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn init_logging() {
    let filter = std::env::var("QUIZ_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .ok()
        .and_then(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Username for an account created on the fly by the development provider.
fn default_username(email: &str) -> String {
    let local = email.split('@').next().unwrap_or(email);
    let mut name: String = local
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .take(32)
        .collect();
    while name.len() < 3 {
        name.push('_');
    }
    name
}

async fn sign_in(
    app: &AppServices,
    credentials: &Credentials,
) -> Result<UserId, Box<dyn std::error::Error>> {
    let auth = app.auth();
    let session = match auth.sign_in(&credentials.email, &credentials.password).await {
        Ok(session) => session,
        Err(AuthError::InvalidCredentials)
            if app.identity_backend() == IdentityBackend::Development =>
        {
            let username = credentials
                .username
                .clone()
                .unwrap_or_else(|| default_username(&credentials.email));
            let outcome = auth
                .sign_up(&credentials.email, &credentials.password, &username)
                .await?;
            if let Some(err) = &outcome.profile_error {
                eprintln!("warning: profile not created: {err}");
            }
            outcome.session
        }
        Err(err) => return Err(err.into()),
    };
    println!("Signed in as {}.", session.user.email);
    Ok(session.user.id)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse(std::env::args().skip(1)).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    init_logging();

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&args.db_url)?;
    let app = AppServices::new_sqlite(&args.db_url, Clock::default_clock()).await?;
    let auth = app.auth();
    if let Err(err) = auth.init().await {
        eprintln!("warning: could not restore session: {err}");
    }

    let user = match &args.credentials {
        Some(credentials) => Some(sign_in(&app, credentials).await?),
        None => None,
    };

    match args.command {
        Command::Categories => {
            for category in app.catalog().list_categories().await? {
                println!(
                    "{:<14} {:<28} {} quizzes",
                    category.id().as_str(),
                    category.name(),
                    category.quiz_count()
                );
            }
        }
        Command::Quizzes { category } => {
            for quiz in app.catalog().list_quizzes(&category).await? {
                println!(
                    "{:<12} {:<36} {:>2} questions  {:>2} min  {}",
                    quiz.id.as_str(),
                    quiz.title,
                    quiz.question_count,
                    quiz.time_limit_minutes,
                    quiz.difficulty
                );
                if let Some(description) = &quiz.description {
                    println!("             {description}");
                }
            }
        }
        Command::Play { category, quiz } => {
            if let Some(summary) = app.catalog().quiz_summary(&category, &quiz).await? {
                println!(
                    "{} [{}]  {} min",
                    summary.title, summary.difficulty, summary.time_limit_minutes
                );
            }
            let runs = app.quiz_runs();
            let run = runs.start(&category, &quiz).await?;
            if let Some(definition) = run.session().quiz() {
                println!("{} questions", definition.question_count());
            }
            terminal::play(&runs, run, user).await?;
        }
        Command::Progress => {
            let user = user.ok_or(ArgsError::MissingUser)?;
            let progress = app.progress().for_user(user, args.recent).await?;
            println!(
                "Level {}  ({} XP, {}/{} to next level)",
                progress.level,
                progress.xp,
                progress.xp_into_level,
                progress.xp_into_level + progress.xp_for_next_level
            );
            println!(
                "Quizzes taken: {}  correct answers: {}  average: {}%  best: {}%",
                progress.quizzes_taken,
                progress.total_correct,
                progress.average_percentage,
                progress.best_percentage
            );
            if !progress.achievements.is_empty() {
                let titles: Vec<String> =
                    progress.achievements.iter().map(ToString::to_string).collect();
                println!("Achievements: {}", titles.join(", "));
            }
            for item in &progress.recent {
                println!(
                    "  #{:<4} {:<12} {}/{} ({}%)  {}",
                    item.id,
                    item.quiz_id.as_str(),
                    item.correct,
                    item.total,
                    item.percentage,
                    item.completed_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        Command::Leaderboard => {
            let board = app.progress().leaderboard(args.limit).await?;
            if board.is_empty() {
                println!("No scores yet.");
            }
            for entry in board {
                println!("{:>3}. {:<32} {} XP", entry.rank, entry.username, entry.score);
            }
        }
    }

    if auth.is_authenticated() {
        auth.sign_out().await?;
    }
    auth.shutdown();
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
