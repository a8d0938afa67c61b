use clap::{Parser, Subcommand};
use futures::stream::{FuturesUnordered, StreamExt};
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;
use vision_core::config::DataConfig;
use vision_core::journal::{DeleteFuture, SaveFuture};
use vision_core::*;

#[derive(Parser)]
#[command(name = "mindvision")]
#[command(about = "Guided visualization practice with a reflection journal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an interactive practice session (default)
    Play {
        /// Tick period in milliseconds (overrides config)
        #[arg(long)]
        tick_ms: Option<u64>,
    },

    /// Create or look up the demo user
    Setup,

    /// List the available exercises
    Catalog,

    /// Manage journal entries directly
    Entries {
        #[command(subcommand)]
        action: EntriesAction,
    },

    /// Export journal entries to CSV
    Export {
        /// Destination CSV file
        #[arg(long)]
        output: PathBuf,
    },

    /// Send one request through the JSON route layer
    Api {
        /// HTTP method (GET, POST, DELETE)
        method: String,

        /// Request target, e.g. /api/entries?userId=...
        target: String,

        /// JSON request body
        #[arg(long)]
        body: Option<String>,
    },
}

#[derive(Subcommand)]
enum EntriesAction {
    /// Show all entries, newest first
    List,

    /// Record a reflection
    Add {
        /// Exercise title (defaults to the first exercise)
        #[arg(long)]
        exercise: Option<String>,

        /// Reflection text
        content: String,
    },

    /// Delete an entry by id
    Delete {
        /// Entry id
        id: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    vision_core::logging::init(vision_core::logging::level_for_verbosity(cli.verbose));

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| config.data.data_dir.clone());

    match cli.command {
        Some(Commands::Play { tick_ms }) => cmd_play(data_dir, tick_ms, &config).await,
        Some(Commands::Setup) => cmd_setup(data_dir, &config).await,
        Some(Commands::Catalog) => cmd_catalog(&config),
        Some(Commands::Entries { action }) => cmd_entries(data_dir, action, &config).await,
        Some(Commands::Export { output }) => cmd_export(data_dir, output, &config).await,
        Some(Commands::Api {
            method,
            target,
            body,
        }) => cmd_api(data_dir, method, target, body, &config).await,
        None => {
            // Default to "play" command
            cmd_play(data_dir, None, &config).await
        }
    }
}

fn open_store(data_dir: &std::path::Path, config: &Config) -> Result<SqliteEntryStore> {
    std::fs::create_dir_all(data_dir)?;
    SqliteEntryStore::open(&DataConfig::database_path(data_dir), config.demo_user.clone())
}

fn load_catalog(config: &Config) -> Result<Catalog> {
    config.build_catalog().inspect_err(|e| {
        eprintln!("Catalog validation failed:");
        eprintln!("  - {}", e);
    })
}

// ============================================================================
// play
// ============================================================================

enum Flow {
    Continue,
    Quit,
}

struct Player<S: EntryStore + 'static> {
    session: JournalSession<S>,
    schedule: TickSchedule,
    pending_save: Option<SaveFuture>,
    pending_deletes: FuturesUnordered<DeleteFuture>,
    interactive: bool,
}

async fn cmd_play(data_dir: PathBuf, tick_ms: Option<u64>, config: &Config) -> Result<()> {
    let catalog = load_catalog(config)?;
    let store = open_store(&data_dir, config)?;
    let tick = tick_ms
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.playback.tick_period());
    tracing::info!(
        exercises = catalog.len(),
        tick_ms = tick.as_millis() as u64,
        "Starting play session in {:?}",
        data_dir
    );

    // The session talks to the store through the same JSON contract a
    // remote client would use
    let gateway = Arc::new(RouteGateway::new(store));
    let session = JournalSession::new(Arc::new(catalog), gateway);

    let mut player = Player {
        session,
        schedule: TickSchedule::new(tick),
        pending_save: None,
        pending_deletes: FuturesUnordered::new(),
        interactive: io::stdout().is_terminal(),
    };

    player.session.initialize().await;
    print_exercise(player.session.navigator());
    if let SessionStatus::Failed(message) = player.session.status() {
        println!("✗ Could not load your journal: {}", message);
        println!("  'r' + Enter to retry");
    }
    print_help();

    let result = player.run().await;

    // Release the timer on every exit path
    player.schedule.cancel();
    // Submitted saves and deletes complete even when input failed
    player.drain().await;
    result?;

    tracing::info!("Play session ended");
    println!("Session ended.");
    Ok(())
}

impl<S: EntryStore + 'static> Player<S> {
    async fn run(&mut self) -> Result<()> {
        let mut input = BufReader::new(tokio::io::stdin());
        // Survives a cancelled read, which may leave a partial line behind
        let mut pending_line = Vec::new();

        loop {
            tokio::select! {
                _ = self.schedule.tick() => self.on_tick(),
                Some(result) = await_pending(&mut self.pending_save) => {
                    self.pending_save = None;
                    self.report_save(result);
                }
                Some((id, result)) = self.pending_deletes.next(), if !self.pending_deletes.is_empty() => {
                    self.report_delete(id, result);
                }
                read = input.read_until(b'\n', &mut pending_line) => {
                    if read? == 0 {
                        // EOF
                        return Ok(());
                    }
                    // Bytes that are not UTF-8 become an unknown command
                    let line = String::from_utf8_lossy(&pending_line).into_owned();
                    pending_line.clear();
                    if let Flow::Quit = self.handle_command(line.trim()).await {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Wait for outstanding store calls so no submitted action is lost
    async fn drain(&mut self) {
        if let Some(pending) = self.pending_save.take() {
            let result = pending.await;
            self.report_save(result);
        }
        while let Some((id, result)) = self.pending_deletes.next().await {
            self.report_delete(id, result);
        }
    }

    fn on_tick(&mut self) {
        let counted = self.session.navigator_mut().tick();
        self.schedule.sync(self.session.navigator().timer());
        if !counted {
            return;
        }

        let nav = self.session.navigator();
        if nav.timer().state() == TimerState::Exhausted {
            if self.interactive {
                println!();
            }
            println!("✓ {} complete", nav.active_exercise().title);
            print_prompts(nav.active_exercise());
        } else if self.interactive {
            print!("\r{}", status_line(nav));
            let _ = io::stdout().flush();
        }
    }

    async fn handle_command(&mut self, line: &str) -> Flow {
        let (command, arg) = match line.split_once(char::is_whitespace) {
            Some((command, arg)) => (command, arg.trim()),
            None => (line, ""),
        };

        match command {
            "" => {}
            "q" | "quit" => return Flow::Quit,
            "h" | "?" | "help" => print_help(),
            "p" => {
                let state = self.session.navigator_mut().toggle();
                self.schedule.sync(self.session.navigator().timer());
                match state {
                    TimerState::Running => println!("▶ Playing"),
                    TimerState::Idle => println!("⏸ Paused"),
                    TimerState::Exhausted => println!("Exercise already complete - 'n' for the next one"),
                }
            }
            "n" => {
                self.session.navigator_mut().next();
                self.schedule.restart(self.session.navigator().timer());
                print_exercise(self.session.navigator());
            }
            "b" => {
                self.session.navigator_mut().previous();
                self.schedule.restart(self.session.navigator().timer());
                print_exercise(self.session.navigator());
            }
            "w" => {
                if arg.is_empty() {
                    println!("Usage: w <text>");
                } else {
                    self.session.navigator_mut().append_draft(arg);
                    println!(
                        "Draft: {} characters",
                        self.session.navigator().draft().chars().count()
                    );
                }
            }
            "c" => {
                self.session.navigator_mut().clear_draft();
                println!("Draft cleared");
            }
            "s" => self.start_save(),
            "d" => self.start_delete(arg),
            "l" => print_entries(self.session.entries()),
            "i" => {
                print_exercise(self.session.navigator());
                print_prompts(self.session.navigator().active_exercise());
            }
            "t" => println!("{}", status_line(self.session.navigator())),
            "e" => self.session.clear_error(),
            "r" => {
                if matches!(self.session.status(), SessionStatus::Failed(_)) {
                    self.pending_save = None;
                    self.pending_deletes.clear();
                    self.session.retry().await;
                    if *self.session.status() == SessionStatus::Ready {
                        println!("✓ Journal loaded ({} entries)", self.session.entries().len());
                    } else {
                        print_error(&self.session);
                    }
                } else {
                    println!("Journal is already loaded");
                }
            }
            other => println!("Unknown command '{}' - 'h' for help", other),
        }
        Flow::Continue
    }

    fn start_save(&mut self) {
        if self.session.is_saving() {
            println!("Save already in progress");
            return;
        }
        match self.session.begin_save() {
            Some(pending) => {
                self.pending_save = Some(pending);
                println!("Saving...");
            }
            None => match self.session.status() {
                SessionStatus::Ready => println!("Nothing to save - 'w <text>' to write"),
                _ => println!("Journal unavailable - 'r' to retry"),
            },
        }
    }

    fn start_delete(&mut self, arg: &str) {
        let Ok(entry_id) = Uuid::parse_str(arg) else {
            println!("Usage: d <entry id>");
            return;
        };
        match self.session.begin_delete(entry_id) {
            Some(pending) => {
                self.pending_deletes.push(pending);
                println!("Deleting...");
            }
            None if self.session.is_deleting(entry_id) => println!("Delete already in progress"),
            None => println!("Journal unavailable - 'r' to retry"),
        }
    }

    fn report_save(&mut self, result: StoreResult<JournalEntry>) {
        let retryable = result.as_ref().err().is_some_and(StoreError::is_retryable);
        match self.session.finish_save(result) {
            Some(entry) => println!("✓ Entry saved ({})", entry.id),
            None => {
                print_error(&self.session);
                if retryable {
                    println!("  Draft kept - 's' to try again");
                }
            }
        }
    }

    fn report_delete(&mut self, id: Uuid, result: StoreResult<()>) {
        let failed = result.is_err();
        self.session.finish_delete(id, result);
        if failed {
            print_error(&self.session);
        } else {
            println!("✓ Entry deleted");
        }
    }
}

async fn await_pending<T>(slot: &mut Option<futures::future::BoxFuture<'static, T>>) -> Option<T> {
    match slot.as_mut() {
        Some(pending) => Some(pending.await),
        None => std::future::pending().await,
    }
}

// ============================================================================
// other commands
// ============================================================================

async fn cmd_setup(data_dir: PathBuf, config: &Config) -> Result<()> {
    let store = open_store(&data_dir, config)?;
    let user = store.ensure_demo_user().await?;
    tracing::info!("Demo user {} ready", user.user_id);

    println!("✓ Demo user ready");
    println!("  Name:  {}", user.name);
    println!("  Email: {}", user.email);
    println!("  Id:    {}", user.user_id);
    Ok(())
}

fn cmd_catalog(config: &Config) -> Result<()> {
    let catalog = load_catalog(config)?;
    for (idx, exercise) in catalog.exercises().iter().enumerate() {
        println!(
            "{}. {} ({}, {})",
            idx + 1,
            exercise.title,
            format_time(exercise.duration_seconds),
            exercise.difficulty.label()
        );
        println!("   {}", exercise.description);
        for prompt in &exercise.prompts {
            println!("   \"{}\"", prompt);
        }
    }
    Ok(())
}

async fn cmd_entries(data_dir: PathBuf, action: EntriesAction, config: &Config) -> Result<()> {
    let store = open_store(&data_dir, config)?;
    let user = store.ensure_demo_user().await?;

    match action {
        EntriesAction::List => {
            let entries = store.list_entries(user.user_id).await?;
            print_entries(&entries);
        }
        EntriesAction::Add { exercise, content } => {
            if content.trim().is_empty() {
                return Err(Error::Store(StoreError::InvalidInput(
                    "content must not be empty".into(),
                )));
            }
            let catalog = load_catalog(config)?;
            let exercise = match exercise {
                Some(title) if catalog.position(&title).is_some() => title,
                Some(title) => {
                    return Err(Error::Store(StoreError::InvalidInput(format!(
                        "Unknown exercise '{}'",
                        title
                    ))))
                }
                None => catalog.get(0).title.clone(),
            };
            let entry = store
                .create_entry(NewEntry {
                    date: chrono::Utc::now(),
                    exercise,
                    content,
                    user_id: user.user_id,
                })
                .await?;
            println!("✓ Entry saved ({})", entry.id);
        }
        EntriesAction::Delete { id } => {
            let entry_id = Uuid::parse_str(&id)
                .map_err(|_| Error::Store(StoreError::InvalidInput("Invalid ID format".into())))?;
            store.delete_entry(entry_id, user.user_id).await?;
            tracing::info!("Deleted entry {}", entry_id);
            println!("✓ Entry deleted");
        }
    }
    Ok(())
}

async fn cmd_export(data_dir: PathBuf, output: PathBuf, config: &Config) -> Result<()> {
    let store = open_store(&data_dir, config)?;
    let user = store.ensure_demo_user().await?;
    let entries = store.list_entries(user.user_id).await?;

    tracing::info!("Exporting {} entries for {}", entries.len(), user.email);
    let count = write_entries_csv(&entries, &output)?;
    println!("✓ Exported {} entries", count);
    println!("  CSV: {}", output.display());
    Ok(())
}

async fn cmd_api(
    data_dir: PathBuf,
    method: String,
    target: String,
    body: Option<String>,
    config: &Config,
) -> Result<()> {
    let store = open_store(&data_dir, config)?;
    let response = dispatch(&store, &method, &target, body.as_deref()).await;
    tracing::info!("{} {} answered {}", method, target, response.status);

    println!("HTTP {}", response.status);
    println!("{}", serde_json::to_string_pretty(&response.body)?);
    Ok(())
}

// ============================================================================
// display
// ============================================================================

fn print_exercise(nav: &SessionNavigator) {
    let exercise = nav.active_exercise();
    println!();
    println!("╭─────────────────────────────────────────╮");
    println!(
        "│  {}/{}  {}",
        nav.active_index() + 1,
        nav.catalog().len(),
        exercise.title
    );
    println!("╰─────────────────────────────────────────╯");
    println!("  {}", exercise.description);
    println!(
        "  Duration: {}   Level: {}",
        format_time(exercise.duration_seconds),
        exercise.difficulty.label()
    );
    println!("  {}", status_line(nav));
    println!();
}

fn print_prompts(exercise: &Exercise) {
    if exercise.prompts.is_empty() {
        return;
    }
    println!("  Reflect:");
    for prompt in &exercise.prompts {
        println!("    \"{}\"", prompt);
    }
}

fn status_line(nav: &SessionNavigator) -> String {
    const WIDTH: usize = 20;
    let timer = nav.timer();
    let filled = ((timer.progress_percent() / 100.0) * WIDTH as f64).round() as usize;
    let state = match timer.state() {
        TimerState::Idle => "Paused",
        TimerState::Running => "Playing",
        TimerState::Exhausted => "Complete",
    };
    format!(
        "⏱ {}  [{}{}] {:5.1}%  {}",
        format_time(timer.remaining_seconds()),
        "#".repeat(filled.min(WIDTH)),
        "-".repeat(WIDTH - filled.min(WIDTH)),
        timer.progress_percent(),
        state
    )
}

fn print_entries(entries: &[JournalEntry]) {
    if entries.is_empty() {
        println!("No journal entries yet.");
        return;
    }
    for entry in entries {
        println!(
            "{} - {}  [{}]",
            entry.date.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M"),
            entry.exercise,
            entry.id
        );
        for line in entry.content.lines() {
            println!("    {}", line);
        }
    }
}

fn print_error<S: EntryStore + 'static>(session: &JournalSession<S>) {
    if let Some(message) = session.error() {
        println!("✗ {}", message);
    }
}

fn print_help() {
    println!("─────────────────────────────────────────");
    println!("  p play/pause    n next    b previous");
    println!("  w <text> write  c clear   s save entry");
    println!("  l list entries  d <id> delete entry");
    println!("  i info  t time  e dismiss error  r retry");
    println!("  q quit");
    println!("─────────────────────────────────────────");
}
