use std::fmt;

use api::ApiConfig;
use chrono::Duration;
use lms_core::Clock;
use lms_core::gate::GateDecision;
use lms_core::model::{CourseId, Identity, LessonId, Role, UserId};
use services::{AppServices, CoursePage, PlaybackSession};
use tracing_subscriber::EnvFilter;

const DEFAULT_DB_URL: &str = "sqlite://lms-session.sqlite3";

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArg { name: &'static str },
    UnknownArg(String),
    Invalid {
        flag: &'static str,
        raw: String,
        source: lms_core::Error,
    },
    InvalidSeconds { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArg { name } => write!(f, "missing <{name}>"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::Invalid { flag, raw, source } => {
                write!(f, "invalid {flag} value: {raw} ({source})")
            }
            ArgsError::InvalidSeconds { raw } => write!(f, "invalid --watch value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
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

fn parse_value<T>(raw: String, flag: &'static str) -> Result<T, ArgsError>
where
    T: std::str::FromStr,
    T::Err: Into<lms_core::Error>,
{
    raw.parse().map_err(|err: T::Err| ArgsError::Invalid {
        flag,
        raw,
        source: err.into(),
    })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- [--api <url>] [--db <sqlite_url>] <command>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  session show");
    eprintln!("  session set --token <t> --user-id <id> --name <n> --email <e> --role <role>");
    eprintln!("  session clear");
    eprintln!("  course <course-id>");
    eprintln!("  lesson <lesson-id> [--watch <secs>]");
    eprintln!("  complete <lesson-id>");
    eprintln!("  enroll <course-id>");
    eprintln!("  claim <course-id>");
    eprintln!("  certificates");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --api http://localhost:8080/api");
    eprintln!("  --db {DEFAULT_DB_URL}");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  LMS_API_URL, LMS_DB_URL, LMS_HTTP_TIMEOUT_SECS, RUST_LOG");
}

#[derive(Debug)]
enum Command {
    SessionShow,
    SessionSet { token: String, identity: Identity },
    SessionClear,
    Course(CourseId),
    Lesson { id: LessonId, watch: Option<u32> },
    Complete(LessonId),
    Enroll(CourseId),
    Claim(CourseId),
    Certificates,
}

struct Args {
    api_url: Option<String>,
    db_url: String,
    command: Command,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut api_url = None;
        let mut db_url = std::env::var("LMS_DB_URL").unwrap_or_else(|_| DEFAULT_DB_URL.into());

        let name = loop {
            let Some(arg) = args.next() else {
                return Err(ArgsError::MissingArg { name: "command" });
            };
            match arg.as_str() {
                "--api" => api_url = Some(require_value(args, "--api")?),
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ if arg.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => break arg,
            }
        };

        let command = match name.as_str() {
            "session" => parse_session(args)?,
            "course" => Command::Course(positional(args, "course-id", "course id")?),
            "lesson" => parse_lesson(args)?,
            "complete" => Command::Complete(positional(args, "lesson-id", "lesson id")?),
            "enroll" => Command::Enroll(positional(args, "course-id", "course id")?),
            "claim" => Command::Claim(positional(args, "course-id", "course id")?),
            "certificates" => Command::Certificates,
            _ => return Err(ArgsError::UnknownArg(name)),
        };

        if let Some(extra) = args.next() {
            return Err(ArgsError::UnknownArg(extra));
        }

        Ok(Self {
            api_url,
            db_url,
            command,
        })
    }
}

fn positional<T>(
    args: &mut impl Iterator<Item = String>,
    name: &'static str,
    flag: &'static str,
) -> Result<T, ArgsError>
where
    T: std::str::FromStr,
    T::Err: Into<lms_core::Error>,
{
    let raw = args.next().ok_or(ArgsError::MissingArg { name })?;
    parse_value(raw, flag)
}

fn parse_lesson(args: &mut impl Iterator<Item = String>) -> Result<Command, ArgsError> {
    let id = positional(args, "lesson-id", "lesson id")?;
    let mut watch = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--watch" => {
                let value = require_value(args, "--watch")?;
                let secs = value
                    .parse()
                    .map_err(|_| ArgsError::InvalidSeconds { raw: value.clone() })?;
                watch = Some(secs);
            }
            _ => return Err(ArgsError::UnknownArg(arg)),
        }
    }
    Ok(Command::Lesson { id, watch })
}

fn parse_session(args: &mut impl Iterator<Item = String>) -> Result<Command, ArgsError> {
    let action = args.next().ok_or(ArgsError::MissingArg { name: "action" })?;
    match action.as_str() {
        "show" => Ok(Command::SessionShow),
        "clear" => Ok(Command::SessionClear),
        "set" => {
            let mut token = None;
            let mut id = None;
            let mut name = None;
            let mut email = None;
            let mut role = None;
            while let Some(arg) = args.next() {
                match arg.as_str() {
                    "--token" => token = Some(require_value(args, "--token")?),
                    "--user-id" => {
                        id = Some(parse_value::<UserId>(
                            require_value(args, "--user-id")?,
                            "--user-id",
                        )?);
                    }
                    "--name" => name = Some(require_value(args, "--name")?),
                    "--email" => email = Some(require_value(args, "--email")?),
                    "--role" => {
                        let raw = require_value(args, "--role")?;
                        role = Some(parse_value::<Role>(raw, "--role")?);
                    }
                    _ => return Err(ArgsError::UnknownArg(arg)),
                }
            }
            Ok(Command::SessionSet {
                token: token.ok_or(ArgsError::MissingValue { flag: "--token" })?,
                identity: Identity {
                    id: id.ok_or(ArgsError::MissingValue { flag: "--user-id" })?,
                    name: name.unwrap_or_default(),
                    email: email.unwrap_or_default(),
                    role: role.unwrap_or(Role::Student),
                },
            })
        }
        _ => Err(ArgsError::UnknownArg(action)),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_page(page: &CoursePage) {
    println!("{} ({}) - {} complete", page.course.title, page.course.id, page.percent());
    for entry in &page.lessons {
        let marker = match (entry.completed, entry.accessible) {
            (true, _) => "done",
            (false, true) => "open",
            (false, false) => "locked",
        };
        println!(
            "  {:>3}. {} [{}] {marker}",
            entry.lesson.order, entry.lesson.title, entry.lesson.id
        );
    }
    println!("  certificate: {:?}", page.certificate.state());
}

fn print_navigation(playback: &PlaybackSession) {
    if let Some(previous) = playback.previous_lesson() {
        println!("  previous: {} [{}]", previous.title, previous.id);
    }
    if let Some(next) = playback.next_lesson() {
        let state = match playback.check_navigation(next.id) {
            GateDecision::Allowed => "open".to_owned(),
            GateDecision::AlreadyHere => "current".to_owned(),
            GateDecision::Locked(reason) => reason.to_string(),
        };
        println!("  next: {} [{}] - {state}", next.title, next.id);
    }
}

async fn watch(playback: &mut PlaybackSession, secs: u32) {
    let duration = playback.tracker().duration();
    playback.on_metadata(duration);
    for second in 1..=secs {
        playback.advance_clock(Duration::seconds(1));
        let update = playback.on_position(f64::from(second));
        if update.newly_completed {
            println!("  completed at {second}s");
        }
        if f64::from(second) >= duration {
            playback.on_ended();
            break;
        }
    }
    playback.flush().await;
}

async fn execute(app: &AppServices, command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::SessionShow => {
            match app.session().viewer().identity() {
                Some(identity) => println!(
                    "{} <{}> ({}, id {})",
                    identity.name, identity.email, identity.role, identity.id
                ),
                None => println!("anonymous"),
            }
            Ok(())
        }
        Command::SessionSet { token, identity } => {
            app.session().sign_in(token, identity).await?;
            Ok(())
        }
        Command::SessionClear => {
            app.session().sign_out().await?;
            Ok(())
        }
        Command::Course(id) => {
            let mut page = app.courses().open(id).await?;
            print_page(&page);
            if let Some(celebration) = page.completion.celebration.take() {
                celebration.await?;
            }
            Ok(())
        }
        Command::Lesson { id, watch: secs } => {
            let mut playback = app.play(id).await?;
            if let Some(secs) = secs {
                watch(&mut playback, secs).await;
            }
            println!(
                "lesson {id}: {} watched, completed: {}",
                playback.percent(),
                playback.is_completed()
            );
            print_navigation(&playback);
            Ok(())
        }
        Command::Complete(id) => {
            let mut playback = app.play(id).await?;
            playback.mark_complete();
            playback.flush().await;
            println!("lesson {id} marked complete");
            print_navigation(&playback);
            Ok(())
        }
        Command::Enroll(id) => {
            let courses = app.courses();
            let mut page = courses.open(id).await?;
            let outcome = courses.enroll(&mut page).await?;
            println!("{outcome:?}");
            print_page(&page);
            Ok(())
        }
        Command::Claim(id) => {
            let courses = app.courses();
            let mut page = courses.open(id).await?;
            let certificate = courses.claim(&mut page).await?;
            println!(
                "issued {} for {}",
                certificate.certificate_number, certificate.course_title
            );
            list_certificates(app).await
        }
        Command::Certificates => list_certificates(app).await,
    }
}

async fn list_certificates(app: &AppServices) -> Result<(), Box<dyn std::error::Error>> {
    let certificates = app.certificates().my_certificates().await?;
    if certificates.is_empty() {
        println!("no certificates");
    }
    for certificate in certificates {
        println!(
            "{}  {}  issued {}",
            certificate.certificate_number,
            certificate.course_title,
            certificate.issued_date.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);
    let parsed = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let config = ApiConfig::from_env_with(parsed.api_url.as_deref())?;
    let timeout = config.timeout;

    // Playback is simulated, so its clock only moves when the simulation says so.
    let clock = Clock::fixed(Clock::system().now());
    let app = AppServices::new_sqlite(&parsed.db_url, config, clock).await?;
    tracing::debug!(timeout_secs = timeout.as_secs(), db = %parsed.db_url, "services ready");

    execute(&app, parsed.command).await
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
