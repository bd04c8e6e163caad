use clap::{Parser, Subcommand};
use pachilog::history::Database;
use pachilog::snapshot::{self, DEFAULT_SNAPSHOT_PATH};
use pachilog::{border, report};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pachilog")]
#[command(author, version, about = "Track pachinko play sessions, spin rates, and border lines")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the interactive session UI (the default when no command is given)
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3939")]
        port: u16,

        /// Snapshot file for crash/refresh recovery
        #[arg(long, default_value = DEFAULT_SNAPSHOT_PATH)]
        snapshot: PathBuf,

        /// Don't open the browser automatically
        #[arg(long)]
        no_open: bool,
    },

    /// Compute the border line for a machine spec file (JSON)
    Border {
        /// Machine spec file
        spec: PathBuf,

        /// Print the raw result as JSON instead of a breakdown
        #[arg(long)]
        json: bool,
    },

    /// Export the current session's records (.csv, .json)
    Export {
        /// Output report file
        output: PathBuf,

        /// Snapshot file to read the session from
        #[arg(long, default_value = DEFAULT_SNAPSHOT_PATH)]
        snapshot: PathBuf,
    },

    /// Completed-session history operations
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Subcommand, Debug)]
enum HistoryAction {
    /// List recent sessions
    List {
        /// Number of sessions to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Show one session with its row records
    Show {
        /// Session ID
        id: i32,
    },

    /// Lifetime statistics across all sessions
    Stats,

    /// Delete all stored history
    Clear,

    /// Create a backup of the history database
    Backup {
        /// Output path for backup (default: pachilog_backup_<timestamp>.db)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    let args = Args::parse();

    match args.command {
        None => {
            // Bare `pachilog` launches the UI with defaults
            if let Err(e) = pachilog::serve::start(3939, PathBuf::from(DEFAULT_SNAPSHOT_PATH), true)
            {
                eprintln!("Server error: {}", e);
                std::process::exit(1);
            }
        }

        Some(Command::Serve { port, snapshot, no_open }) => {
            if let Err(e) = pachilog::serve::start(port, snapshot, !no_open) {
                eprintln!("Server error: {}", e);
                std::process::exit(1);
            }
        }

        Some(Command::Border { spec, json }) => handle_border(&spec, json),

        Some(Command::Export { output, snapshot: snapshot_path }) => {
            let snap = match snapshot::load(&snapshot_path) {
                Some(snap) => snap,
                None => {
                    eprintln!("No session snapshot at {}", snapshot_path.display());
                    std::process::exit(1);
                }
            };
            if snap.records.is_empty() {
                eprintln!("Snapshot has no row records to export.");
                std::process::exit(1);
            }
            if let Err(e) = report::generate(&output, &snap.records) {
                eprintln!("Failed to write report: {}", e);
                std::process::exit(1);
            }
            eprintln!(
                "\x1b[32mExported {} record(s) to {}\x1b[0m",
                snap.records.len(),
                output.display()
            );
        }

        Some(Command::History { action }) => handle_history_action(action),
    }
}

fn handle_border(spec_path: &PathBuf, as_json: bool) {
    let data = match std::fs::read_to_string(spec_path) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("Failed to read {}: {}", spec_path.display(), e);
            std::process::exit(1);
        }
    };

    let spec: border::MachineSpec = match serde_json::from_str(&data) {
        Ok(spec) => spec,
        Err(e) => {
            eprintln!("Bad machine spec: {}", e);
            std::process::exit(1);
        }
    };

    let (result, warnings) = spec.compute();
    for w in &warnings {
        eprintln!("\x1b[33mWarning: {}\x1b[0m", w);
    }

    if as_json {
        match serde_json::to_string_pretty(&result) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error serializing result: {}", e),
        }
        return;
    }

    if !spec.name.is_empty() {
        println!("\x1b[1m{}\x1b[0m", spec.name);
        println!("{}", "─".repeat(48));
    }
    println!("{:<34} {:>10.3}", "Average RUSH chain length", result.avg_chain);
    println!("{:<34} {:>10.2}", "Initial hit, no RUSH (balls)", result.normal_expectation);
    println!("{:<34} {:>10.2}", "RUSH continuation hit (balls)", result.rush_expectation);
    println!("{:<34} {:>10.2}", "One RUSH entry (balls)", result.rush_cycle_expectation);
    println!("{:<34} {:>10.2}", "Initial hit into RUSH (balls)", result.entry_expectation);
    println!("{:<34} {:>10.2}", "Blended expectation (balls)", result.blended_expectation);
    println!("{:<34} {:>10.2}", "Balls per ¥1000", result.thousand_yen_balls);
    println!("{:<34} \x1b[1m{:>10.2}\x1b[0m", "Border line (spins/K)", result.border_line);
}

fn handle_history_action(action: HistoryAction) {
    let db = match Database::open() {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Failed to open history database: {}", e);
            std::process::exit(1);
        }
    };

    match action {
        HistoryAction::List { limit } => match db.recent_sessions(limit) {
            Ok(sessions) => {
                if sessions.is_empty() {
                    println!("No sessions recorded.");
                } else {
                    println!(
                        "{:<5} {:<11} {:<16} {:<6} {:<12} {:>10} {:>9}",
                        "ID", "DATE", "SHOP", "TABLE", "TIME", "INVEST", "AVG RATE"
                    );
                    println!("{}", "-".repeat(76));
                    for s in sessions {
                        println!(
                            "{:<5} {:<11} {:<16} {:<6} {:<12} {:>9}¥ {:>9.2}",
                            s.id,
                            s.date,
                            truncate(&s.shop_name, 16),
                            s.table_number,
                            format!("{}-{}", s.started_at, s.ended_at),
                            s.total_invest,
                            s.avg_spin_rate
                        );
                    }
                }
            }
            Err(e) => eprintln!("Error: {}", e),
        },

        HistoryAction::Show { id } => {
            match db.get_session(id) {
                Ok(Some(s)) => {
                    println!(
                        "{} {} table {} ({}, {}-{}, {} min)",
                        s.date, s.shop_name, s.table_number, s.rate, s.started_at, s.ended_at,
                        s.duration_min
                    );
                    println!(
                        "invested ¥{}  used {} balls  {} spins  avg rate {:.2}  final {} balls",
                        s.total_invest, s.total_used_balls, s.total_spins, s.avg_spin_rate,
                        s.final_balls
                    );
                }
                Ok(None) => {
                    eprintln!("No session with id {}", id);
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }

            match db.session_rows(id) {
                Ok(rows) if !rows.is_empty() => {
                    println!();
                    println!(
                        "{:<7} {:>7} {:>7} {:>7} {:>7} {:>8} {:>8} {:>7} {:>7}",
                        "TIME", "USED", "START", "END", "SPINS", "RATE", "GAINED", "ROUNDS", "PER R"
                    );
                    for r in rows {
                        println!(
                            "{:<7} {:>7} {:>7} {:>7} {:>7} {:>8.2} {:>8} {:>7} {:>7.2}",
                            r.time, r.used_balls, r.start_spin, r.end_spin, r.normal_spins,
                            r.spin_rate, r.gained_balls, r.rounds, r.payout_per_round
                        );
                    }
                }
                Ok(_) => {}
                Err(e) => eprintln!("Error: {}", e),
            }
        }

        HistoryAction::Stats => match db.lifetime_stats() {
            Ok(stats) => {
                println!("Sessions:       {}", stats.session_count);
                println!("Total invested: ¥{}", stats.total_invest);
                println!("Total spins:    {}", stats.total_spins);
                match stats.avg_spin_rate {
                    Some(avg) => println!("Avg spin rate:  {:.2}", avg),
                    None => println!("Avg spin rate:  n/a"),
                }
            }
            Err(e) => eprintln!("Error: {}", e),
        },

        HistoryAction::Clear => match db.clear() {
            Ok(count) => println!("Removed {} session(s).", count),
            Err(e) => eprintln!("Error: {}", e),
        },

        HistoryAction::Backup { output } => {
            let db_path = Database::db_path();
            if !db_path.exists() {
                eprintln!("No database found at {}", db_path.display());
                return;
            }

            let backup_path = output.unwrap_or_else(|| {
                let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
                PathBuf::from(format!("pachilog_backup_{}.db", timestamp))
            });

            match std::fs::copy(&db_path, &backup_path) {
                Ok(bytes) => {
                    println!("Backup created: {} ({} bytes)", backup_path.display(), bytes);
                }
                Err(e) => {
                    eprintln!("Failed to create backup: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
