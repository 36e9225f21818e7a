use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use lecturebell::cli::{parse_args, print_help};
use lecturebell::config::Config;
use lecturebell::engine::ScheduleClock;
use lecturebell::notify::{AnyNotifier, NotifierChoice};
use lecturebell::prefs::JsonFileStore;
use lecturebell::redact;
use lecturebell::resolver::local_now;
use lecturebell::shell::{self, Command, Outcome, ViewState};
use lecturebell::ticker::{LiveStatus, LiveTicker};
use lecturebell::timetable::Timetable;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = parse_args();

    if args.help {
        print_help();
        return Ok(());
    }

    // Logs go to stderr; stdout belongs to the shell
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("lecturebell=info".parse()?))
        .init();

    info!("lecturebell v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    info!("Configuration loaded");
    info!("  Timezone: {}", config.timezone);
    info!(
        "  Alerts: {} min before start, {} min before end",
        config.start_alert_minutes, config.end_alert_minutes
    );
    info!("  Preferences: {}", config.prefs_path.display());
    info!("  Notifier: {:?}", config.notifier);
    if config.notifier == NotifierChoice::Pushover {
        info!("  Pushover user: {}", redact::optional_token(config.pushover_user_key.as_deref()));
        info!("  Pushover token: {}", redact::optional_token(config.pushover_api_token.as_deref()));
    }

    // Handle --validate mode
    if args.validate {
        info!("Validating configuration...");
        match config.validate() {
            Ok(()) => {
                info!("Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        }
    }
    config.validate()?;

    let timetable = Arc::new(Timetable::builtin());
    let notifier = Arc::new(AnyNotifier::from_config(&config));
    let prefs = Box::new(JsonFileStore::open(&config.prefs_path));
    let mut clock = ScheduleClock::new(&config, timetable, notifier, prefs);

    let mut view = ViewState {
        query: args.search.unwrap_or_default(),
        show_full: args.week,
    };

    // Flags shape the first plan; nothing is sent for the stored session
    if let Err(e) = clock
        .apply_startup_overrides(args.division.as_deref(), args.notify)
        .await
    {
        warn!("{}", e);
    }
    let now = local_now(config.timezone);
    clock.start(now).await;

    println!("{}", shell::render_view(&clock, &view, &now));

    // Single snapshot (alerts already due were sent by start)
    if args.once {
        clock.teardown();
        return Ok(());
    }

    println!("Type 'help' for commands.");

    let mut ticker = LiveTicker::new(Duration::from_secs(config.tick_interval_secs), config.timezone);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut last_status: Option<LiveStatus> = Some(clock.live_status(&now));

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            now = ticker.tick() => {
                if clock.sync_day(now).await.is_some() {
                    println!("{}", shell::render_view(&clock, &view, &now));
                }
                let status = clock.live_status(&now);
                if shell::status_changed(last_status.as_ref(), &status) {
                    println!("{}", shell::render_status_line(&status));
                    last_status = Some(status);
                }
            }
            line = lines.next_line(), if stdin_open => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        info!("stdin closed, live view keeps running (Ctrl-C to exit)");
                        stdin_open = false;
                        continue;
                    }
                    Err(e) => {
                        warn!("Failed to read command: {}", e);
                        stdin_open = false;
                        continue;
                    }
                };

                let now = local_now(config.timezone);
                match Command::parse(&line) {
                    Ok(None) => {}
                    Ok(Some(command)) => match shell::execute(command, &mut clock, &mut view, now).await {
                        Outcome::Render => {
                            println!("{}", shell::render_view(&clock, &view, &now));
                            last_status = Some(clock.live_status(&now));
                        }
                        Outcome::Message(message) => println!("{}", message),
                        Outcome::Quit => break,
                    },
                    Err(e) => println!("{}", e),
                }
            }
            _ = &mut shutdown => {
                info!("Shutting down");
                break;
            }
        }
    }

    clock.teardown();
    Ok(())
}
