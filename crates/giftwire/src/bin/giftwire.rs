//! # Giftwire CLI
//!
//! Thin front-end over [`giftwire::Engine`].
//!
//! ```bash
//! giftwire giftwire.toml farm
//! giftwire giftwire.toml send 901 10
//! giftwire giftwire.toml list-add Winter box
//! giftwire giftwire.toml export report
//! RUST_LOG=debug giftwire giftwire.toml dispose
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;

use giftwire::events::{EngineEvent, DEFAULT_EVENT_CAPACITY};
use giftwire::stats::record::unix_now;
use giftwire::stats::{DropLog, DEFAULT_COMPARE_WINDOW, REPORT_FORECAST_UNITS};
use giftwire::{
    AllowListStore, Connector, DisposalOutcome, Engine, EngineError, EngineResult, EventSink,
    GiftwireConfig,
};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
usage: giftwire <config.toml> <command>

commands:
  farm                      open every listed container, record the yield
  dispose                   delete everything in partitions 0-3
  inspect                   show the inventory by partition
  catalog                   list containers the server sells
  refresh-list              replace the allow-list with the catalog names
  list                      show the allow-list
  list-add <name>           add a container name to the allow-list
  list-remove <name>        remove a container name from the allow-list
  send <souvenir-id> <n>    buy n containers for the receiver account
  stats [n]                 drop probabilities and a forecast for n opens
  trends                    per-item probability trends
  compare                   summaries of the most recent sessions
  best [name...]            rarest drops, or the named ones
  export <stats|list|report> [path]
                            write sessions or the allow-list as JSON, or a
                            full text report";

/// Default forecast horizon for `stats`.
const DEFAULT_FORECAST: u64 = 100;

/// Parsed command line.
enum CliCommand {
    Farm,
    Dispose,
    Inspect,
    Catalog,
    RefreshList,
    Send { souvenir: String, count: u32 },
    Stats { forecast: u64 },
    Trends,
    Compare,
    Best { names: Vec<String> },
    List,
    ListAdd { name: String },
    ListRemove { name: String },
    Export { kind: ExportKind, path: Option<PathBuf> },
}

/// What `export` writes.
#[derive(Clone, Copy)]
enum ExportKind {
    Stats,
    List,
    Report,
}

impl ExportKind {
    fn parse(value: &str) -> Result<Self, String> {
        match value {
            "stats" => Ok(Self::Stats),
            "list" => Ok(Self::List),
            "report" => Ok(Self::Report),
            other => Err(format!("export kind must be stats, list or report, got {other:?}")),
        }
    }

    fn default_path(self, timestamp: u64) -> PathBuf {
        PathBuf::from(match self {
            Self::Stats => format!("drop_stats_{timestamp}.json"),
            Self::List => format!("present_list_{timestamp}.json"),
            Self::Report => format!("full_report_{timestamp}.txt"),
        })
    }
}

fn parse_args(args: &[String]) -> Result<(String, CliCommand), String> {
    let [config, command, rest @ ..] = args else {
        return Err("missing arguments".to_string());
    };

    let command = match (command.as_str(), rest) {
        ("farm", []) => CliCommand::Farm,
        ("dispose", []) => CliCommand::Dispose,
        ("inspect", []) => CliCommand::Inspect,
        ("catalog", []) => CliCommand::Catalog,
        ("refresh-list", []) => CliCommand::RefreshList,
        ("send", [souvenir, count]) => CliCommand::Send {
            souvenir: souvenir.clone(),
            count: count
                .parse()
                .map_err(|_| format!("count must be a positive integer, got {count:?}"))?,
        },
        ("stats", []) => CliCommand::Stats {
            forecast: DEFAULT_FORECAST,
        },
        ("stats", [n]) => CliCommand::Stats {
            forecast: n
                .parse()
                .map_err(|_| format!("forecast horizon must be an integer, got {n:?}"))?,
        },
        ("trends", []) => CliCommand::Trends,
        ("compare", []) => CliCommand::Compare,
        ("best", names) => CliCommand::Best {
            names: names.to_vec(),
        },
        ("list", []) => CliCommand::List,
        // Names may contain spaces and arrive split across arguments.
        ("list-add", name @ [_, ..]) => CliCommand::ListAdd { name: name.join(" ") },
        ("list-remove", name @ [_, ..]) => CliCommand::ListRemove { name: name.join(" ") },
        ("export", [kind]) => CliCommand::Export {
            kind: ExportKind::parse(kind)?,
            path: None,
        },
        ("export", [kind, path]) => CliCommand::Export {
            kind: ExportKind::parse(kind)?,
            path: Some(PathBuf::from(path)),
        },
        (other, _) => return Err(format!("unknown command or wrong arguments: {other}")),
    };

    Ok((config.clone(), command))
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_event(event: &EngineEvent) {
    match event {
        EngineEvent::ResolutionPass {
            pass,
            pending,
            opened_so_far,
        } => println!("🔄 Pass {pass}: {pending} containers found, {opened_so_far} opened so far"),
        EngineEvent::DisposalPass {
            pass,
            visible,
            pending,
        } => println!("🔄 Pass {pass}: {visible} items visible, deleting {pending}"),
        EngineEvent::StallDetected {
            pass,
            visible,
            stalled,
        } => println!("⚠️  Pass {pass}: {visible} items are not being removed (stall {stalled})"),
        EngineEvent::GiftSent {
            index,
            total,
            succeeded,
        } if *index == *total || index % 10 == 0 => {
            println!("📤 {index}/{total} {}", if *succeeded { "✓" } else { "✗" });
        }
        _ => {}
    }
}

fn run<C: Connector, L: DropLog, S: AllowListStore>(
    engine: &Engine<C, L, S>,
    command: CliCommand,
) -> EngineResult<()> {
    match command {
        CliCommand::Farm => {
            let report = engine.farm()?;
            let resolution = &report.resolution;
            println!();
            println!("✅ Opened {} containers ({} item types)", resolution.total_opened, resolution.loot.len());
            let mut loot: Vec<_> = resolution.loot.iter().collect();
            loot.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
            for (name, quantity) in loot {
                println!("   • {name}: {quantity}");
            }
        }
        CliCommand::Dispose => {
            let report = engine.dispose()?;
            println!();
            match report.outcome {
                DisposalOutcome::Emptied => {
                    println!("✅ Inventory emptied: {} deleted in {} passes", report.deleted, report.passes);
                }
                DisposalOutcome::Stalled => {
                    println!(
                        "⚠️  Server stopped removing items: {} deleted, {} still visible",
                        report.deleted, report.remaining
                    );
                }
            }
        }
        CliCommand::Inspect => {
            let report = engine.inspect()?;
            println!();
            for (partition, items) in &report.by_partition {
                println!("Section {partition}: {} items", items.len());
                for item in items.iter().take(10) {
                    println!("   • {} (id {}, count {})", item.name, item.id, item.quantity);
                }
                if items.len() > 10 {
                    println!("   … and {} more", items.len() - 10);
                }
            }
            println!();
            println!("Player partitions: {} (removed by dispose)", report.player_items);
            println!("Other partitions:  {} (never touched)", report.other_items);
        }
        CliCommand::Catalog => {
            for entry in engine.catalog()? {
                println!("{:>8}  {}", entry.id, entry.name);
            }
        }
        CliCommand::RefreshList => {
            let list = engine.refresh_allow_list()?;
            println!("✅ Allow-list now has {} names", list.len());
            for name in list.names() {
                println!("   • {name}");
            }
        }
        CliCommand::Send { souvenir, count } => {
            let report = engine.send(&souvenir, count)?;
            println!();
            println!(
                "✅ Sent {} to {}: {} succeeded, {} failed",
                report.sent,
                engine.recipient(),
                report.succeeded,
                report.failed
            );
        }
        CliCommand::Stats { forecast } => {
            let Some(totals) = engine.stats().total_stats()? else {
                println!("No sessions recorded yet.");
                return Ok(());
            };
            println!(
                "📊 {} sessions, {} containers opened, {} item types",
                totals.sessions,
                totals.total_opened,
                totals.items.len()
            );
            println!();
            for p in engine.stats().probabilities(&totals) {
                println!("{:>8.2}%  {:<10} {} ({} units)", p.percent, p.rarity.as_str(), p.name, p.count);
            }
            println!();
            println!("🔮 Forecast for {forecast} opens:");
            for f in engine.stats().forecast(forecast, &totals) {
                println!("   {}: {:.1} [{:.1} – {:.1}]", f.name, f.expected, f.low, f.high);
            }
        }
        CliCommand::Trends => {
            let trends = engine.stats().trend()?;
            if trends.is_empty() {
                println!("Not enough sessions for trends (need at least 3).");
            }
            for t in trends {
                println!(
                    "{:<8} {:+.2} pp/session  {} (recent {:.2}%, mean {:.2}%)",
                    format!("{:?}", t.direction),
                    t.slope,
                    t.name,
                    t.recent_percent,
                    t.average_percent
                );
            }
        }
        CliCommand::Compare => {
            let rows = engine.stats().compare_sessions(DEFAULT_COMPARE_WINDOW)?;
            if rows.is_empty() {
                println!("Need at least 2 sessions to compare.");
            }
            for row in rows {
                println!(
                    "{}  opened {:>5}  items {:>6}  unique {:>4}  per open {:.2}",
                    row.timestamp, row.opened, row.total_items, row.unique_items, row.items_per_open
                );
            }
        }
        CliCommand::Best { names } => {
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            for drop in engine.stats().best_drops(&names)? {
                println!(
                    "{:<10} {:>7.3}%  ~1 per {} opens  {}",
                    drop.rarity.as_str(), drop.percent, drop.expected_opens, drop.name
                );
            }
        }
        CliCommand::List => {
            let list = engine.allow_list_names()?;
            if list.is_empty() {
                println!("Allow-list is empty.");
            }
            for name in list.names() {
                println!("   • {name}");
            }
        }
        CliCommand::ListAdd { name } => {
            if engine.add_container(&name)? {
                println!("✅ Added {name:?}");
            } else {
                println!("⚠️  {name:?} is already in the list");
            }
        }
        CliCommand::ListRemove { name } => {
            if engine.remove_container(&name)? {
                println!("✅ Removed {name:?}");
            } else {
                println!("⚠️  {name:?} is not in the list");
            }
        }
        CliCommand::Export { kind, path } => {
            let contents = match kind {
                ExportKind::Stats => engine.export_stats_json()?,
                ExportKind::List => engine.export_allow_list_json()?,
                ExportKind::Report => {
                    let Some(report) = engine.full_report(REPORT_FORECAST_UNITS)? else {
                        println!("No sessions recorded yet.");
                        return Ok(());
                    };
                    report
                }
            };
            let path = path.unwrap_or_else(|| kind.default_path(unix_now()));
            std::fs::write(&path, contents)
                .map_err(|e| EngineError::Store(format!("cannot write {}: {e}", path.display())))?;
            println!("✅ Exported to {}", path.display());
        }
    }
    Ok(())
}

const fn exit_code(error: &EngineError) -> u8 {
    match error {
        EngineError::Session(_) => 2,
        EngineError::IterationLimitExceeded { .. } => 3,
        EngineError::RecursionLimitExceeded { .. } => 4,
        EngineError::Cancelled => 5,
        EngineError::Config(_) => 64,
        EngineError::Store(_) | EngineError::Stats(_) | EngineError::Json(_) => 1,
    }
}

fn main() -> ExitCode {
    init_logging();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (config_path, command) = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(message) => {
            eprintln!("✗ {message}");
            eprintln!();
            eprintln!("{USAGE}");
            return ExitCode::from(64);
        }
    };

    let config = match GiftwireConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("✗ {e}");
            return ExitCode::from(exit_code(&e));
        }
    };

    println!("═══════════════════════════════════════════════════════════════════");
    println!("                         GIFTWIRE v{}", env!("CARGO_PKG_VERSION"));
    println!("═══════════════════════════════════════════════════════════════════");
    println!("  Server:    {}", config.endpoint());
    println!("  Sender:    {}", config.identities.sender.login);
    println!("  Receiver:  {}", config.identities.receiver.login);
    println!();

    let (sink, receiver) = EventSink::channel(DEFAULT_EVENT_CAPACITY);
    let progress = thread::spawn(move || {
        for event in receiver {
            print_event(&event);
        }
    });

    // The sink lives inside the engine; dropping the engine ends the progress thread.
    let result = Engine::from_config(&config).and_then(|engine| run(&engine.with_events(sink), command));
    let _ = progress.join();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("✗ {e}");
            ExitCode::from(exit_code(&e))
        }
    }
}
