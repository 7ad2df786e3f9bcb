mod console;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use exam_core::model::{ExamDefinition, ExamDefinitionDraft, ExamMode};
use exam_core::{EngineSettings, EngineSettingsDraft};
use services::{Clock, CompletionHandler, ExamSessionService, SubmittedExam};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::oneshot;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::console::{ConsoleCommand, Reply};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingExam,
    UnknownArg(String),
    InvalidMode { raw: String },
    InvalidDbUrl { raw: String },
    InvalidNumber { var: &'static str, raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingExam => f.write_str("--exam <file.json> is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidMode { raw } => {
                write!(f, "invalid mode: {raw} (expected practice or challenge)")
            }
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNumber { var, raw } => write!(f, "invalid {var} value: {raw}"),
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

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- run   --exam <file.json> [--mode practice|challenge] [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- clear --exam <file.json> [--db <sqlite_url>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --mode from the exam file (practice when absent)");
    eprintln!("  --db sqlite:exam.sqlite3");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  EXAM_DB_URL, EXAM_MODE, EXAM_DEBOUNCE_MS, EXAM_LOW_TIME_SECS, EXAM_MAX_VIOLATIONS");
    eprintln!("  RUST_LOG (default: services=info,storage=info)");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Run,
    Clear,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "run" => Some(Self::Run),
            "clear" => Some(Self::Clear),
            _ => None,
        }
    }
}

struct Args {
    exam_path: String,
    mode: Option<ExamMode>,
    db_url: String,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>, command: Command) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("EXAM_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://exam.sqlite3".into(), normalize_sqlite_url);
        let mut mode = match std::env::var("EXAM_MODE") {
            Ok(raw) => Some(parse_mode(raw)?),
            Err(_) => None,
        };
        let mut exam_path = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--exam" => exam_path = Some(require_value(args, "--exam")?),
                "--mode" if command == Command::Run => {
                    mode = Some(parse_mode(require_value(args, "--mode")?)?);
                }
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            exam_path: exam_path.ok_or(ArgsError::MissingExam)?,
            mode,
            db_url,
        })
    }
}

fn parse_mode(raw: String) -> Result<ExamMode, ArgsError> {
    raw.parse().map_err(|_| ArgsError::InvalidMode { raw })
}

fn env_number<T: std::str::FromStr>(var: &'static str) -> Result<Option<T>, ArgsError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ArgsError::InvalidNumber { var, raw }),
        Err(_) => Ok(None),
    }
}

/// Engine tunables from the environment; anything unset keeps its default.
fn settings_from_env() -> Result<EngineSettings, Box<dyn std::error::Error>> {
    let draft = EngineSettingsDraft {
        persist_debounce: env_number::<u64>("EXAM_DEBOUNCE_MS")?.map(Duration::from_millis),
        low_time_threshold_secs: env_number("EXAM_LOW_TIME_SECS")?,
        max_violations: env_number("EXAM_MAX_VIOLATIONS")?,
        ..EngineSettingsDraft::default()
    };
    Ok(draft.validate()?)
}

fn load_exam(path: &str, mode: Option<ExamMode>) -> Result<ExamDefinition, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    let draft: ExamDefinitionDraft = serde_json::from_str(&raw)?;
    let exam = draft.validate()?;
    Ok(match mode {
        Some(mode) => exam.with_mode(mode),
        None => exam,
    })
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

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("services=info,storage=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let cmd = match argv.next() {
        None => {
            print_usage();
            return Ok(());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(&first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    let parsed = Args::parse(&mut argv, cmd).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    init_tracing();
    let settings = settings_from_env()?;
    let exam = load_exam(&parsed.exam_path, parsed.mode)?;

    // Open + migrate SQLite here so the library crates never touch the filesystem layout.
    prepare_sqlite_file(&parsed.db_url)?;
    let service = ExamSessionService::new_sqlite(&parsed.db_url, Clock::system())
        .await?
        .with_settings(settings);

    match cmd {
        Command::Run => run_exam(&service, exam).await,
        Command::Clear => {
            service.discard_saved(&exam).await?;
            println!("cleared saved progress for {}", exam.title());
            Ok(())
        }
    }
}

/// Completion handler that forwards the result to the console loop.
fn completion_channel() -> (CompletionHandler, oneshot::Receiver<SubmittedExam>) {
    let (done_tx, done) = oneshot::channel();
    let on_complete: CompletionHandler = Box::new(move |submitted| {
        if done_tx.send(submitted).is_err() {
            debug!("console closed before the exam result arrived");
        }
    });
    (on_complete, done)
}

async fn run_exam(
    service: &ExamSessionService,
    exam: ExamDefinition,
) -> Result<(), Box<dyn std::error::Error>> {
    let (on_complete, mut done) = completion_channel();

    let persists = exam.mode().policy().persists();
    let handle = service.start_running(Arc::new(exam), on_complete).await;
    println!("{}", handle.with_session(|session| console::render_view(&session.view()))?);
    println!("(type `help` for commands)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            submitted = &mut done => {
                if let Ok(submitted) = submitted {
                    println!("\n{}", console::render_submitted(&submitted));
                }
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let command = match line.parse::<ConsoleCommand>() {
                    Ok(command) => command,
                    Err(err) => {
                        println!("{err}");
                        continue;
                    }
                };
                match handle.with_session(|session| console::execute(session, command))? {
                    Reply::Print(out) if out.is_empty() => {}
                    Reply::Print(out) => println!("{out}"),
                    Reply::Quit => {
                        if persists {
                            // Let the last staged change reach storage before teardown.
                            tokio::time::sleep(service.settings().persist_debounce()).await;
                            println!("progress saved; run again to resume");
                        }
                        break;
                    }
                }
            }
        }
    }

    handle.close().await?;
    info!("exam console closed");
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

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::{OptionLabel, Question, QuestionId, QuestionOptions};
    use exam_core::time::fixed_now;

    fn single_question_exam() -> Arc<ExamDefinition> {
        let draft = ExamDefinitionDraft {
            title: "Late".into(),
            questions: vec![Question {
                id: QuestionId::new(1),
                question: "Q1".into(),
                options: QuestionOptions {
                    a: "a".into(),
                    b: "b".into(),
                    c: "c".into(),
                    d: "d".into(),
                },
                correct_answer: Some(OptionLabel::A),
            }],
            time_limit: 5,
            mode: ExamMode::Challenge,
        };
        Arc::new(draft.validate().unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn result_is_delivered_to_the_console() {
        let (on_complete, done) = completion_channel();
        let mut session = ExamSessionService::in_memory(Clock::fixed(fixed_now()))
            .start(single_question_exam(), on_complete)
            .await;
        assert!(session.request_submit());
        session.confirm_submit().unwrap();
        assert_eq!(done.await.unwrap().stats.total_questions, 1);
        session.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn submit_after_console_closed_does_not_panic() {
        let (on_complete, done) = completion_channel();
        drop(done);
        let mut session = ExamSessionService::in_memory(Clock::fixed(fixed_now()))
            .start(single_question_exam(), on_complete)
            .await;
        assert!(session.request_submit());
        session.confirm_submit().unwrap();
        assert!(session.is_submitted());
        session.close().await;
    }
}
