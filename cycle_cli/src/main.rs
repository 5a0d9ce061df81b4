use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use cycle_core::*;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cyclelog")]
#[command(about = "Private menstrual cycle log and predictor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show predictions for the current cycle (default)
    Predict {
        /// Predict from this start date instead of the last logged one
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Also list fertile windows for this many upcoming cycles
        #[arg(long, default_value_t = 0)]
        cycles: u32,
    },

    /// Log a period
    Log {
        /// First day of the period (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,

        /// Last day of the period (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,
    },

    /// Delete every logged period starting on a date
    Delete {
        /// Start date of the period to delete (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,
    },

    /// List logged periods, most recent first
    History,

    /// Show cycle statistics
    Stats,

    /// Export logged periods as CSV
    Export {
        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Show or set your usual cycle length in days
    CycleLength {
        /// New cycle length; omit to show the current one
        days: Option<i64>,
    },

    /// Delete all stored data
    Clear {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    cycle_core::logging::init();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(data_dir) = cli.data_dir {
        config.data.data_dir = data_dir;
    }

    tracing::debug!("Using data directory {:?}", config.data.data_dir);
    let mut history = HistoryStore::open(&config);
    let mode = history.mode();
    if mode == StoreMode::Memory || (config.storage.private && mode.is_degraded()) {
        eprintln!(
            "⚠ Using {} storage for {}",
            mode,
            config.prefs_path().display()
        );
    }

    match cli.command {
        Some(Commands::Predict { start, cycles }) => cmd_predict(&history, start, cycles),
        Some(Commands::Log { start, end }) => cmd_log(&mut history, start, end),
        Some(Commands::Delete { start }) => cmd_delete(&mut history, start),
        Some(Commands::History) => cmd_history(&history),
        Some(Commands::Stats) => cmd_stats(&history),
        Some(Commands::Export { output }) => cmd_export(&history, output),
        Some(Commands::CycleLength { days }) => cmd_cycle_length(&mut history, days),
        Some(Commands::Clear { yes }) => cmd_clear(&mut history, yes),
        None => {
            // Default to "predict" command
            cmd_predict(&history, None, 0)
        }
    }
}

type Store = HistoryStore<Box<dyn PrefsStore>>;

fn cmd_log(history: &mut Store, start: NaiveDate, end: Option<NaiveDate>) -> Result<()> {
    if let Some(end) = end {
        if end < start {
            return Err(Error::InvalidEntry(format!(
                "end date {} cannot be before start date {}",
                end, start
            )));
        }
    }

    history.save_entry(start, end)?;

    let entry = PeriodEntry::new(start, end);
    println!("✓ Period logged: {}", describe_entry(&entry));
    println!("  Average cycle: {} days", history.average_cycle_length());

    if let Some(next) = history.calculator().next_period_date() {
        println!("  Next period expected: {}", next);
    }

    Ok(())
}

fn cmd_delete(history: &mut Store, start: NaiveDate) -> Result<()> {
    let before = history.history().len();
    history.delete_entry(start)?;
    let removed = before - history.history().len();

    if removed == 0 {
        println!("No period starting {} found.", start);
    } else {
        println!("✓ Deleted {} period(s) starting {}", removed, start);
    }
    Ok(())
}

fn cmd_history(history: &Store) -> Result<()> {
    let entries = history.entries();
    if entries.is_empty() {
        println!("No period data recorded yet.");
        return Ok(());
    }

    println!("Period history ({} entries):", entries.len());
    for entry in &entries {
        println!("  {}", describe_entry(entry));
    }
    Ok(())
}

fn cmd_predict(history: &Store, start: Option<NaiveDate>, cycles: u32) -> Result<()> {
    let mut calculator = history.calculator();
    if let Some(start) = start {
        calculator.set_reference_start(start);
    }

    let Some(reference) = calculator.reference_start() else {
        println!("No period start recorded yet. Log one with `cyclelog log --start YYYY-MM-DD`.");
        return Ok(());
    };

    let today = Local::now().date_naive();

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  CYCLE PREDICTION");
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  Period started: {}", reference);
    println!("  Cycle length:   {} days", calculator.cycle_length());

    if let Some(next) = calculator.next_period_date() {
        println!("  Next period:    {}", next);
    }
    if let Some(end) = calculator.next_period_end() {
        println!("  Period ends:    {}", end);
    }
    if let Some(window) = calculator.fertile_window() {
        println!("  Fertile window: {}", window);
    }
    if let Some(days) = calculator.days_until_next_period_on(today) {
        println!("  Days until next period: {}", days);
    }
    if let Some(days) = calculator.days_until_fertile_window_on(today) {
        println!("  Days until fertile window: {}", days);
    }
    if let Some(status) = calculator.day_status_on(today) {
        println!("  Today:          {}", status);
    }
    if calculator.is_in_fertile_window_on(today) {
        println!("  → Today is in the fertile window");
    }

    if cycles > 0 {
        println!();
        println!("  Upcoming fertile windows:");
        for n in 1..=i64::from(cycles) {
            if let Some(window) = calculator.fertile_window_for_cycle(n) {
                println!("    Cycle +{}: {}", n, window);
            }
        }
    }

    println!();
    Ok(())
}

fn cmd_stats(history: &Store) -> Result<()> {
    let entries = history.entries();
    let analytics = CycleAnalytics::from_entries(&entries);

    if !analytics.statistics.has_data() {
        println!("Not enough data: log at least two periods to see statistics.");
        println!("  Assumed cycle length: {} days", history.effective_cycle_length());
        return Ok(());
    }

    let stats = analytics.statistics;
    println!("Cycle statistics ({} periods):", entries.len());
    println!("  Average cycle:     {} days", stats.average);
    println!("  Shortest cycle:    {} days", stats.min);
    println!("  Longest cycle:     {} days", stats.max);
    println!("  Weighted average:  {} days", analytics.weighted_average);
    println!("  Most common:       {} days", analytics.most_common);
    println!("  Std deviation:     {:.1} days", analytics.variance.std_dev);
    println!("  Confidence:        {:.0}%", analytics.confidence * 100.0);
    println!("  Past accuracy:     {:.0}%", analytics.historical_accuracy);
    if let Some(length) = analytics.average_period_length {
        println!("  Average period:    {} days", length);
    }
    Ok(())
}

fn cmd_export(history: &Store, output: Option<PathBuf>) -> Result<()> {
    let csv = history.export_csv()?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(&path, csv)?;
            println!("✓ Exported period history to {}", path.display());
        }
        None => print!("{}", csv),
    }
    Ok(())
}

fn cmd_cycle_length(history: &mut Store, days: Option<i64>) -> Result<()> {
    match days {
        Some(days) if days <= 0 => Err(Error::InvalidEntry(format!(
            "cycle length must be positive, got {}",
            days
        ))),
        Some(days) => {
            history.set_manual_cycle_length(days)?;
            println!("✓ Cycle length set to {} days", days);
            Ok(())
        }
        None => {
            match history.manual_cycle_length() {
                Some(days) => println!("Cycle length: {} days (set manually)", days),
                None => println!(
                    "Cycle length: {} days (from history)",
                    history.average_cycle_length()
                ),
            }
            Ok(())
        }
    }
}

fn cmd_clear(history: &mut Store, yes: bool) -> Result<()> {
    if !yes {
        println!("This deletes all stored period data. Re-run with --yes to confirm.");
        return Ok(());
    }

    history.clear_all()?;
    println!("✓ All period data cleared");
    Ok(())
}

fn describe_entry(entry: &PeriodEntry) -> String {
    match entry.end {
        Some(end) => format!(
            "{} to {} ({} days)",
            entry.start,
            end,
            entry.duration_days()
        ),
        None => format!("{} (no end date)", entry.start),
    }
}
