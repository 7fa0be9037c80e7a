use clap::{error::ErrorKind, ArgAction, CommandFactory, Parser};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use log::{info, warn};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::Rect,
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    time::Duration,
};

use dragten::{
    app::{history_lines, ranking_lines, App},
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    logging::{level_for_verbosity, FileLogger},
    runtime::{CrosstermEventSource, DeadlineScheduler, Runner},
    score_store::{BackgroundScoreStore, MemoryScoreStore, SqliteScoreStore},
    Session, UserId,
};

/// How long the loop waits for input when no tick is pending
const IDLE_WAIT_MS: u64 = 250;

/// timed drag puzzle: select rectangles of digits that sum to ten
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Drag a rectangle over the board with the mouse. If the digits inside add up to exactly 10 they are cleared and you score one point per digit. The game ends when the countdown reaches zero."
)]
pub struct Cli {
    /// user id to save scores under (remembered for next time)
    #[clap(short = 'u', long)]
    user: Option<String>,

    /// number of seconds per game
    #[clap(short = 's', long)]
    secs: Option<u32>,

    /// board rows
    #[clap(long)]
    rows: Option<usize>,

    /// board columns
    #[clap(long)]
    cols: Option<usize>,

    /// seed for reproducible boards
    #[clap(long)]
    seed: Option<u64>,

    /// play without saving scores
    #[clap(long)]
    no_save: bool,

    /// path to the scores database
    #[clap(long, value_name = "PATH")]
    db: Option<PathBuf>,

    /// print your most recent games and exit
    #[clap(long, value_name = "N", num_args = 0..=1, default_missing_value = "10")]
    history: Option<usize>,

    /// print the best score of each player and exit
    #[clap(long, value_name = "N", num_args = 0..=1, default_missing_value = "10")]
    top: Option<usize>,

    /// log verbosity (-v info, -vv debug, -vvv trace)
    #[clap(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn db_path(&self) -> PathBuf {
        self.db
            .clone()
            .or_else(AppDirs::db_path)
            .unwrap_or_else(|| PathBuf::from("dragten_scores.db"))
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if cli.history.is_some() || cli.top.is_some() {
        return print_scores(&cli);
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    if let Some(path) = AppDirs::log_path() {
        // Logging is best effort; the game runs without it.
        if let Ok(logger) = FileLogger::open(path, level_for_verbosity(cli.verbose)) {
            let _ = logger.install();
        }
    }

    let mut app = build_app(&cli);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    // Dropping the app flushes any queued score report.
    drop(app);
    log::logger().flush();
    result
}

/// Apply command line overrides on top of the stored config.
fn merge_config(cli: &Cli, mut config: Config) -> Config {
    if let Some(user) = cli.user.as_ref() {
        config.user_id = Some(user.clone());
    }
    if let Some(secs) = cli.secs {
        config.session_secs = secs;
    }
    if let Some(rows) = cli.rows {
        config.rows = rows;
    }
    if let Some(cols) = cli.cols {
        config.cols = cols;
    }
    config
}

fn print_scores(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let config = merge_config(cli, FileConfigStore::new().load());
    let scores = SqliteScoreStore::open(cli.db_path())?;

    if let Some(limit) = cli.history {
        match config.user_id.and_then(UserId::new) {
            Some(user) => {
                for line in history_lines(&scores, &user, limit)? {
                    println!("{}", line);
                }
            }
            None => println!("no user set, pass --user to see a history"),
        }
    }
    if let Some(limit) = cli.top {
        for line in ranking_lines(&scores, limit)? {
            println!("{}", line);
        }
    }
    Ok(())
}

fn build_app(cli: &Cli) -> App {
    let config_store = FileConfigStore::new();
    let stored = config_store.load();
    let config = merge_config(cli, stored.clone());

    if config.user_id != stored.user_id {
        let remembered = Config {
            user_id: config.user_id.clone(),
            ..stored
        };
        if let Err(err) = config_store.save(&remembered) {
            warn!("could not remember user in {}: {}", config_store.path().display(), err);
        }
    }

    let user = if cli.no_save {
        None
    } else {
        config.user_id.clone().and_then(UserId::new)
    };

    let db_path = cli.db_path();

    // Guests never touch the database.
    let writer = if user.is_some() {
        match SqliteScoreStore::open(&db_path) {
            Ok(writer) => Some(writer),
            Err(err) => {
                warn!("scores will not be saved, {}: {}", db_path.display(), err);
                None
            }
        }
    } else {
        None
    };

    let (store, scores) = match writer {
        Some(writer) => {
            let reader = match SqliteScoreStore::open(&db_path) {
                Ok(reader) => Some(reader),
                Err(err) => {
                    warn!("best scores unavailable: {}", err);
                    None
                }
            };
            (BackgroundScoreStore::spawn(writer), reader)
        }
        None => (BackgroundScoreStore::spawn(MemoryScoreStore::new()), None),
    };

    let mut session = Session::new(
        config.session_config(cli.seed),
        store,
        DeadlineScheduler::new(),
    )
    .with_user(user);
    session.reset();
    info!(
        "dragten started for {}",
        session
            .user_id()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "guest".to_string())
    );

    App::new(session, scores)
}

fn start_tui<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        Duration::from_millis(IDLE_WAIT_MS),
    );

    let size = terminal.size()?;
    app.on_resize(Rect::new(0, 0, size.width, size.height));
    terminal.draw(|f| app.draw(f))?;

    loop {
        let Some(event) = runner.step(app.session_mut().scheduler_mut()) else {
            continue;
        };
        if !app.handle(event) {
            break;
        }
        terminal.draw(|f| app.draw(f))?;
    }

    Ok(())
}
