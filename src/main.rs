//! Command-line driver for the astrowatch dashboard client.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use astrowatch::actions::ChatStyle;
use astrowatch::api::ApiClient;
use astrowatch::config::{self, AppConfig};
use astrowatch::dashboard::{Dashboard, DashboardOptions, DashboardStatus};
use astrowatch::model::{NewsItem, Prediction, UserProfile};
use astrowatch::session::SessionStore;
use astrowatch::solar::SolarPoint;
use astrowatch::store::StoreListener;
use astrowatch::view::{self, Readout};
use astrowatch::{app_dirs, logging};
use rand::SeedableRng;
use rand::rngs::StdRng;
use time::{OffsetDateTime, UtcOffset};

const APP_NAME: &str = "astrowatch";

fn main() {
    if let Err(err) = try_main() {
        eprintln!("{APP_NAME}: {err}");
        std::process::exit(1);
    }
}

#[derive(Debug, Default)]
struct CliArgs {
    base_url: Option<String>,
    duration: Option<Duration>,
    once: bool,
    token: Option<String>,
    logout: bool,
    upload: Option<PathBuf>,
    generate: Option<String>,
    generate_ai: Option<String>,
    chat: Option<String>,
}

fn try_main() -> Result<(), String> {
    let args = match parse_args(std::env::args().skip(1).collect()) {
        Ok(args) => args,
        Err(message) if message == help_text() => {
            println!("{message}");
            return Ok(());
        }
        Err(message) => return Err(message),
    };
    if let Err(err) = logging::init() {
        eprintln!("Logging disabled: {err}");
    }

    let mut config = config::load_or_default().unwrap_or_else(|err| {
        tracing::warn!("Using default config: {err}");
        AppConfig::default()
    });
    if let Some(base_url) = &args.base_url {
        config.base_url = base_url.clone();
    }
    let config = config.normalized();

    let session = Arc::new(SessionStore::persistent().unwrap_or_else(|err| {
        tracing::warn!("Persistent session unavailable, keeping token in memory: {err}");
        SessionStore::in_memory(None)
    }));
    if args.logout {
        session.clear().map_err(|err| err.to_string())?;
        println!("Logged out.");
        return Ok(());
    }
    if let Some(token) = &args.token {
        session.set(token).map_err(|err| err.to_string())?;
    }

    let client = ApiClient::new(&config.base_url, Arc::clone(&session)).map_err(|err| err.to_string())?;
    let download_dir = match &config.download_dir {
        Some(dir) => dir.clone(),
        None => app_dirs::downloads_dir().map_err(|err| err.to_string())?,
    };
    let offset = view::display_offset();
    let options = DashboardOptions::from_config(&config, download_dir, offset);
    let mut dashboard = Dashboard::new(
        client,
        session,
        ConsoleListener { offset },
        options,
        StdRng::from_os_rng(),
        OffsetDateTime::now_utc(),
    );

    if let Some(path) = &args.upload {
        let report = dashboard.upload(path).map_err(|err| err.to_string())?;
        println!("Uploaded {}; refreshed {} resources.", path.display(), report.outcomes.len());
        return Ok(());
    }
    if let Some(event_type) = &args.generate {
        let download = dashboard.generate(event_type).map_err(|err| err.to_string())?;
        println!("Saved {} ({} bytes)", download.path.display(), download.bytes);
        return Ok(());
    }
    if let Some(prompt) = &args.generate_ai {
        let download = dashboard.generate_ai(prompt).map_err(|err| err.to_string())?;
        println!("Saved {} ({} bytes)", download.path.display(), download.bytes);
        return Ok(());
    }
    if let Some(message) = &args.chat {
        let reply = dashboard.chat(message).map_err(|err| err.to_string())?;
        let tag = match reply.style {
            ChatStyle::Mission => "[MISSION] ",
            ChatStyle::General => "[GENERAL] ",
            ChatStyle::Plain => "",
        };
        println!("{tag}{}", reply.text);
        return Ok(());
    }
    if args.once {
        let report = dashboard.refresh_now();
        for (endpoint, outcome) in &report.outcomes {
            println!("{:<28} {outcome:?}", endpoint.path());
        }
        return if report.logout {
            Err("Session expired".into())
        } else {
            Ok(())
        };
    }

    run_wall_clock(&mut dashboard, args.duration)
}

/// Sleep until each task is due and fire it, optionally stopping after `limit`.
fn run_wall_clock<L: StoreListener>(
    dashboard: &mut Dashboard<ApiClient, L>,
    limit: Option<Duration>,
) -> Result<(), String> {
    let origin = Instant::now();
    dashboard.start();
    while let Some(due) = dashboard.next_due() {
        let target = match limit {
            Some(limit) if due > limit => limit,
            _ => due,
        };
        let elapsed = origin.elapsed();
        if target > elapsed {
            std::thread::sleep(target - elapsed);
        }
        if dashboard.run_until(target) == DashboardStatus::Stopped {
            return Err("Session expired; log in again with --token".into());
        }
        if limit.is_some_and(|limit| target >= limit) {
            break;
        }
    }
    tracing::info!(elapsed_s = origin.elapsed().as_secs(), "Dashboard loop finished");
    Ok(())
}

/// Logs each refreshed slice the way the panels would show it.
struct ConsoleListener {
    offset: UtcOffset,
}

impl StoreListener for ConsoleListener {
    fn predictions_updated(&mut self, predictions: &[Prediction]) {
        let rows = view::prediction_rows(predictions, self.offset);
        if rows.is_empty() {
            tracing::info!("{}", view::EMPTY_PREDICTIONS);
        }
        for row in rows.iter().take(3) {
            tracing::info!(tone = ?row.tone, clock = %row.clock, "{} {}%", row.name, row.confidence);
        }
    }

    fn solar_updated(&mut self, readout: &Readout, series: &[SolarPoint]) {
        tracing::info!(points = series.len(), "Solar: {}", readout.text);
    }

    fn user_updated(&mut self, user: &UserProfile) {
        let profile = view::profile_view(user);
        tracing::info!(rank = %profile.rank, clearance = %profile.clearance, "Operator {}", profile.name);
    }

    fn news_updated(&mut self, news: &[NewsItem]) {
        let rows = view::news_rows(news, self.offset);
        match rows.first() {
            Some(row) => tracing::info!(items = rows.len(), "Latest news: {}", row.title),
            None => tracing::info!("{}", view::EMPTY_NEWS),
        }
    }

    fn logout_requested(&mut self) {
        tracing::warn!("Session expired. Log in again.");
    }
}

fn parse_args(args: Vec<String>) -> Result<CliArgs, String> {
    if args.iter().any(|a| a == "-h" || a == "--help") {
        return Err(help_text());
    }
    let mut parsed = CliArgs::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--base-url" => parsed.base_url = Some(next_value(&args, &mut i, "--base-url")?),
            "--duration" => {
                let value = next_value(&args, &mut i, "--duration")?;
                let secs: u64 = value
                    .parse()
                    .map_err(|_| format!("Invalid --duration '{value}'"))?;
                parsed.duration = Some(Duration::from_secs(secs));
            }
            "--once" => parsed.once = true,
            "--token" => parsed.token = Some(next_value(&args, &mut i, "--token")?),
            "--logout" => parsed.logout = true,
            "--upload" => parsed.upload = Some(PathBuf::from(next_value(&args, &mut i, "--upload")?)),
            "--generate" => parsed.generate = Some(next_value(&args, &mut i, "--generate")?),
            "--generate-ai" => parsed.generate_ai = Some(next_value(&args, &mut i, "--generate-ai")?),
            "--chat" => parsed.chat = Some(next_value(&args, &mut i, "--chat")?),
            unknown => return Err(format!("Unknown argument '{unknown}'\n\n{}", help_text())),
        }
        i += 1;
    }
    Ok(parsed)
}

fn next_value(args: &[String], i: &mut usize, name: &str) -> Result<String, String> {
    let next = args.get(*i + 1).ok_or_else(|| format!("Missing value for {name}"))?;
    *i += 1;
    Ok(next.clone())
}

fn help_text() -> String {
    format!(
        "Usage: {APP_NAME} [options]\n\n\
Options:\n\
  --base-url <URL>        Backend base URL (default from config.toml)\n\
  --duration <SECS>       Stop the dashboard loop after SECS seconds\n\
  --once                  Refresh once, print the outcome per resource, exit\n\
  --token <TOKEN>         Store a bearer token before running\n\
  --logout                Forget the stored token and exit\n\
  --upload <FILE>         Inject a synthetic event stream file\n\
  --generate <TYPE>       Download a generated synthetic event of TYPE\n\
  --generate-ai <PROMPT>  Download an AI-generated synthetic event\n\
  --chat <MESSAGE>        Ask the mission assistant\n\
  -h, --help              Show help\n"
    )
}
