//! SaveManager - Command-line interface for the save backup engine.
//!
//! Manages the folder-pair entries and settings files, runs copy jobs and save
//! scans on worker threads, and reports their progress on stderr.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use crossbeam_channel::RecvTimeoutError;
use savemgr_engine::{
    default_config_dir, entries_path, job, CancellationToken, CopyEngine, CopyProgressEvent,
    Diagnostic, DiagnosticTag, DiscoveryEngine, DiscoveryEvent, EntryRepository, FolderPairEntry,
    JobOutcome, JobReport, ProgressTracker, Settings, SettingsStore, DEFAULT_CHANNEL_CAPACITY,
};

/// How often the render loop redraws while a worker runs
const TICK: Duration = Duration::from_millis(100);

/// SaveManager - back up game save folders and find where games keep them
#[derive(Parser, Debug)]
#[command(name = "savemgr")]
#[command(version)]
#[command(about = "Back up game save folders and find where games keep them")]
struct Cli {
    /// Directory holding settings.json and save_folders.json
    #[arg(long, value_name = "DIR", global = true)]
    config_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Copy every entry, or only the named ones
    Copy {
        /// Entry names to copy
        #[arg(value_name = "NAME")]
        names: Vec<String>,

        /// Validate and report sizes without copying
        #[arg(long)]
        dry_run: bool,
    },
    /// Search for folders containing save files
    Scan {
        /// Root to search instead of the configured ones (repeatable)
        #[arg(long = "root", value_name = "PATH")]
        roots: Vec<PathBuf>,

        /// Extension to match instead of the configured ones (repeatable)
        #[arg(long = "ext", value_name = "EXT")]
        extensions: Vec<String>,
    },
    /// Manage folder-pair entries
    Entries {
        #[command(subcommand)]
        action: EntriesAction,
    },
    /// Show or change settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand, Debug)]
enum EntriesAction {
    /// List entries in order
    List,
    /// Add a source -> destination pair under a unique name
    Add {
        name: String,
        source: PathBuf,
        destination: PathBuf,
    },
    /// Remove the entry with this name
    Remove { name: String },
    /// Remove every entry and delete the entries file
    Clear,
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    /// Print the current settings
    Show,
    AddExtension { extension: String },
    RemoveExtension { extension: String },
    /// Add a root searched by `scan`
    AddRoot { path: PathBuf },
    RemoveRoot { path: PathBuf },
    /// Add a folder the copy engine never descends into
    AddIgnored { path: PathBuf },
    RemoveIgnored { path: PathBuf },
    /// Set a scalar option
    Set { key: SettingKey, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SettingKey {
    /// Copy into destination/<source folder name>
    CopyFolder,
    /// Per-entry size limit in GB
    SizeLimit,
    SkipExisting,
    SkipHidden,
    ClearDestination,
    ShowImageStatus,
    RememberWindowPos,
}

/// Paths and flags shared by every command
struct Context {
    config_dir: PathBuf,
    verbose: bool,
}

impl Context {
    fn from_cli(cli: &Cli) -> Result<Self, String> {
        let config_dir = cli
            .config_dir
            .clone()
            .or_else(default_config_dir)
            .ok_or("Could not determine a configuration directory; pass --config-dir")?;
        Ok(Context {
            config_dir,
            verbose: cli.verbose,
        })
    }

    fn settings_store(&self) -> SettingsStore {
        SettingsStore::in_dir(&self.config_dir)
    }

    fn load_settings(&self) -> Result<Settings, String> {
        self.settings_store()
            .load()
            .map_err(|e| format!("Failed to load settings: {}", e))
    }

    fn save_settings(&self, settings: &Settings) -> Result<(), String> {
        self.settings_store()
            .save(settings)
            .map_err(|e| format!("Failed to save settings: {}", e))
    }

    fn entries_file(&self) -> PathBuf {
        entries_path(&self.config_dir)
    }

    fn load_entries(&self) -> Result<EntryRepository, String> {
        EntryRepository::load(&self.entries_file())
            .map_err(|e| format!("Failed to load entries: {}", e))
    }

    fn save_entries(&self, entries: &EntryRepository) -> Result<(), String> {
        entries
            .save(&self.entries_file())
            .map_err(|e| format!("Failed to save entries: {}", e))
    }
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_idx])
}

fn format_duration(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, mins, secs)
    } else if mins > 0 {
        format!("{}m {}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}

fn progress_bar(fraction: f32) -> String {
    let percent = (fraction * 100.0).round() as u32;
    let filled = (percent / 5).min(20) as usize;
    format!("[{}{}] {:3}%", "=".repeat(filled), " ".repeat(20 - filled), percent)
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Redraws a single status line on stderr between diagnostics.
#[derive(Default)]
struct StatusLine {
    width: usize,
}

impl StatusLine {
    fn draw(&mut self, line: &str) {
        let pad = self.width.saturating_sub(line.len());
        eprint!("\r{}{}", line, " ".repeat(pad));
        self.width = line.len();
        let _ = std::io::stderr().flush();
    }

    fn clear(&mut self) {
        if self.width > 0 {
            eprint!("\r{}\r", " ".repeat(self.width));
            self.width = 0;
        }
    }

    fn print_diagnostic(&mut self, diagnostic: &Diagnostic) {
        self.clear();
        println!("{}", diagnostic);
    }
}

/// CLI view of a copy run, fed from the event channel
struct CopyView {
    verbose: bool,
    tracker: ProgressTracker,
    line: StatusLine,
}

impl CopyView {
    fn new(verbose: bool) -> Self {
        CopyView {
            verbose,
            tracker: ProgressTracker::new(),
            line: StatusLine::default(),
        }
    }

    fn handle(&mut self, event: &CopyProgressEvent) {
        self.tracker.apply(event);
        match event {
            CopyProgressEvent::Start { total_bytes } => {
                eprintln!("Copying {}...", format_bytes(*total_bytes));
            }
            // Per-file copy lines are noise unless asked for
            CopyProgressEvent::Log(diagnostic) => {
                if self.verbose || diagnostic.tag != DiagnosticTag::Copy {
                    self.line.print_diagnostic(diagnostic);
                }
            }
            CopyProgressEvent::Complete { message }
            | CopyProgressEvent::Cancel { message }
            | CopyProgressEvent::Error { message } => {
                self.render();
                eprintln!();
                eprintln!("{}", message);
                self.line.width = 0;
            }
            CopyProgressEvent::Progress { .. } | CopyProgressEvent::AdjustTotal { .. } => {}
        }
    }

    fn render(&mut self) {
        if !self.tracker.running && self.tracker.status.is_none() {
            return;
        }
        let line = format!(
            "Progress: {} | {}/{} | {}/s | ETA {}",
            progress_bar(self.tracker.fraction()),
            format_bytes(self.tracker.copied_bytes),
            format_bytes(self.tracker.total_bytes),
            format_bytes(self.tracker.speed_bytes_per_sec() as u64),
            format_duration(self.tracker.eta())
        );
        self.line.draw(&line);
    }

    fn summarize(&self, report: &JobReport) {
        eprintln!(
            "Started {}, finished {} ({})",
            local_time(report.started_at),
            local_time(report.finished_at),
            format_duration(report.elapsed().to_std().unwrap_or_default())
        );
        if let JobOutcome::Completed {
            copied_bytes,
            files_copied,
            files_skipped,
        } = &report.outcome
        {
            eprintln!(
                "Summary: {} files copied ({}), {} skipped",
                files_copied,
                format_bytes(*copied_bytes),
                files_skipped
            );
        }
    }
}

/// CLI view of a scan, fed from the event channel
#[derive(Default)]
struct ScanView {
    processed_dirs: u64,
    total_dirs: u64,
    line: StatusLine,
}

impl ScanView {
    fn handle(&mut self, event: &DiscoveryEvent) {
        match event {
            DiscoveryEvent::Start { total_dirs } => {
                self.total_dirs = *total_dirs;
                eprintln!("Scanning {} directories...", total_dirs);
            }
            DiscoveryEvent::Progress {
                processed_dirs,
                total_dirs,
            } => {
                self.processed_dirs = *processed_dirs;
                self.total_dirs = *total_dirs;
            }
            DiscoveryEvent::Diagnostic(diagnostic) => self.line.print_diagnostic(diagnostic),
            DiscoveryEvent::Complete { found } => {
                self.render();
                eprintln!();
                eprintln!("Scan complete: {} folders found", found);
                self.line.width = 0;
            }
            DiscoveryEvent::Cancelled { found } => {
                self.line.clear();
                eprintln!("Scan cancelled: {} folders found so far", found);
            }
        }
    }

    fn render(&mut self) {
        if self.total_dirs == 0 && self.processed_dirs == 0 {
            return;
        }
        let fraction = DiscoveryEvent::Progress {
            processed_dirs: self.processed_dirs,
            total_dirs: self.total_dirs,
        }
        .fraction()
        .unwrap_or(1.0);
        let line = format!(
            "Scanning: {} | {}/{} directories",
            progress_bar(fraction),
            self.processed_dirs,
            self.total_dirs
        );
        self.line.draw(&line);
    }
}

fn init_logging(verbose: bool, debug: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Parse arguments, then run the command
fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.debug);

    let exit_code = match run_cli(&cli) {
        Ok(()) => 0,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            2
        }
    };

    std::process::exit(exit_code);
}

/// Main CLI logic - separated for testability
fn run_cli(cli: &Cli) -> Result<(), String> {
    let ctx = Context::from_cli(cli)?;
    tracing::debug!("using configuration directory {}", ctx.config_dir.display());

    match &cli.command {
        Command::Copy { names, dry_run } => copy_command(&ctx, names, *dry_run),
        Command::Scan { roots, extensions } => scan_command(&ctx, roots, extensions),
        Command::Entries { action } => entries_command(&ctx, action),
        Command::Settings { action } => settings_command(&ctx, action),
    }
}

fn copy_command(ctx: &Context, names: &[String], dry_run: bool) -> Result<(), String> {
    let settings = ctx.load_settings()?;
    let repo = ctx.load_entries()?;

    let entries = if names.is_empty() {
        repo.snapshot()
    } else {
        names
            .iter()
            .map(|name| {
                repo.get(name)
                    .cloned()
                    .ok_or_else(|| format!("No entry named '{}'", name))
            })
            .collect::<Result<Vec<_>, _>>()?
    };
    if entries.is_empty() {
        return Err("No entries to copy. Add one with `savemgr entries add`".to_string());
    }

    let config = settings.copy_job_config(entries);
    let report = job::validate(&config);
    let mut line = StatusLine::default();
    for diagnostic in &report.diagnostics {
        line.print_diagnostic(diagnostic);
    }

    if dry_run {
        for &index in &report.valid_indices {
            println!("Would copy {}", config.entries[index]);
        }
        eprintln!(
            "{} of {} entries valid, {} total",
            report.valid_indices.len(),
            config.entries.len(),
            format_bytes(report.total_bytes)
        );
        return Ok(());
    }
    if report.valid_indices.is_empty() {
        return Err("No valid entries to copy".to_string());
    }

    let engine = CopyEngine::new();
    let (tx, rx) = crossbeam_channel::bounded(DEFAULT_CHANNEL_CAPACITY);
    let handle = engine
        .spawn(config, &report, CancellationToken::new(), tx)
        .map_err(|e| format!("Failed to start copy: {}", e))?;

    let mut view = CopyView::new(ctx.verbose);
    loop {
        match rx.recv_timeout(TICK) {
            Ok(event) => {
                view.handle(&event);
                for event in rx.try_iter() {
                    view.handle(&event);
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if view.tracker.running {
            view.render();
        }
    }

    let job_report = handle
        .join()
        .map_err(|_| "Copy worker panicked".to_string())?;
    view.summarize(&job_report);

    match job_report.outcome {
        JobOutcome::Completed { .. } => Ok(()),
        JobOutcome::Cancelled { .. } => Err("Copy was cancelled".to_string()),
        JobOutcome::Failed { message } => Err(message),
    }
}

fn scan_command(ctx: &Context, roots: &[PathBuf], extensions: &[String]) -> Result<(), String> {
    let settings = ctx.load_settings()?;
    let mut config = settings.discovery_config();
    if !roots.is_empty() {
        config.roots = roots.to_vec();
    }
    if !extensions.is_empty() {
        let mut scratch = Settings {
            file_extensions: Vec::new(),
            ..Settings::default()
        };
        for extension in extensions {
            scratch.add_extension(extension);
        }
        config.extensions = scratch.file_extensions;
    }
    if config.extensions.is_empty() {
        return Err("No file extensions to search for".to_string());
    }

    let engine = DiscoveryEngine::new();
    let (tx, rx) = crossbeam_channel::unbounded();
    let handle = engine
        .spawn(config, CancellationToken::new(), tx)
        .map_err(|e| format!("Failed to start scan: {}", e))?;

    let mut view = ScanView::default();
    loop {
        match rx.recv_timeout(TICK) {
            Ok(event) => {
                view.handle(&event);
                for event in rx.try_iter() {
                    view.handle(&event);
                }
            }
            Err(RecvTimeoutError::Timeout) => view.render(),
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let result = handle
        .join()
        .map_err(|_| "Scan worker panicked".to_string())?;
    if result.is_empty() {
        println!("No save folders found.");
    }
    for (number, dir) in result.numbered() {
        println!("{:>3}. {}", number, dir.display());
    }
    Ok(())
}

fn entries_command(ctx: &Context, action: &EntriesAction) -> Result<(), String> {
    let mut repo = ctx.load_entries()?;

    match action {
        EntriesAction::List => {
            if repo.is_empty() {
                println!("No entries.");
            }
            for (i, entry) in repo.iter().enumerate() {
                println!("{:>3}. {}", i + 1, entry);
            }
            return Ok(());
        }
        EntriesAction::Add {
            name,
            source,
            destination,
        } => {
            if name.trim().is_empty() {
                return Err("Entry name must not be empty".to_string());
            }
            let entry = FolderPairEntry::new(name.trim(), source, destination);
            let added = format!("Added {}", entry);
            repo.add(entry).map_err(|e| e.to_string())?;
            println!("{}", added);
        }
        EntriesAction::Remove { name } => {
            let removed = repo.remove(name).map_err(|e| e.to_string())?;
            println!("Removed {}", removed);
        }
        EntriesAction::Clear => {
            EntryRepository::clear_file(&ctx.entries_file()).map_err(|e| e.to_string())?;
            println!("Cleared {} entries", repo.len());
            return Ok(());
        }
    }

    ctx.save_entries(&repo)
}

fn settings_command(ctx: &Context, action: &SettingsAction) -> Result<(), String> {
    let mut settings = ctx.load_settings()?;

    let changed = match action {
        SettingsAction::Show => {
            print_settings(&settings, ctx.settings_store().path());
            return Ok(());
        }
        SettingsAction::AddExtension { extension } => settings.add_extension(extension),
        SettingsAction::RemoveExtension { extension } => settings.remove_extension(extension),
        SettingsAction::AddRoot { path } => settings.add_folder_path(path),
        SettingsAction::RemoveRoot { path } => settings.remove_folder_path(path),
        SettingsAction::AddIgnored { path } => settings.add_ignored_folder(path),
        SettingsAction::RemoveIgnored { path } => settings.remove_ignored_folder(path),
        SettingsAction::Set { key, value } => {
            apply_setting(&mut settings, *key, value)?;
            true
        }
    };

    if !changed {
        println!("Nothing changed");
        return Ok(());
    }
    ctx.save_settings(&settings)
}

fn apply_setting(settings: &mut Settings, key: SettingKey, value: &str) -> Result<(), String> {
    match key {
        SettingKey::SizeLimit => {
            settings.file_size_limit = value
                .trim()
                .parse()
                .map_err(|_| format!("Invalid size limit '{}'. Must be whole gigabytes", value))?;
        }
        SettingKey::CopyFolder => settings.copy_folder_checkbox_state = parse_bool(value)?,
        SettingKey::SkipExisting => settings.skip_existing_files = parse_bool(value)?,
        SettingKey::SkipHidden => settings.skip_hidden_files = parse_bool(value)?,
        SettingKey::ClearDestination => settings.clear_destination_folder = parse_bool(value)?,
        SettingKey::ShowImageStatus => settings.show_image_status = parse_bool(value)?,
        SettingKey::RememberWindowPos => settings.remember_window_pos = parse_bool(value)?,
    }
    Ok(())
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        _ => Err(format!("Invalid value '{}'. Must be 'true' or 'false'", value)),
    }
}

fn print_settings(settings: &Settings, path: &Path) {
    println!("Settings file: {}", path.display());
    println!("  copy-folder:         {}", settings.copy_folder_checkbox_state);
    println!("  size-limit:          {} GB", settings.file_size_limit);
    println!("  skip-existing:       {}", settings.skip_existing_files);
    println!("  skip-hidden:         {}", settings.skip_hidden_files);
    println!("  clear-destination:   {}", settings.clear_destination_folder);
    println!("  show-image-status:   {}", settings.show_image_status);
    println!("  remember-window-pos: {}", settings.remember_window_pos);
    println!("  extensions:          {}", settings.file_extensions.join(", "));
    println!("  roots:");
    for root in &settings.folder_paths {
        println!("    {}", root.display());
    }
    println!("  ignored:");
    for folder in &settings.ignored_folders {
        println!("    {}", folder.display());
    }
}
