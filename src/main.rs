use std::env;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use dice_average::{
    config::{AppConfig, ConfigStore, OutputFormat},
    display,
    distribution::Distribution,
    error::Error,
    history::{HistoryStore, RollSession},
    parser::parse,
    roller::evaluate,
};

#[derive(Parser)]
#[command(
    name = "dice-average",
    version,
    about = "Roll dice notation and compare the results against exact statistics"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Roll a dice expression and report the outcomes
    Roll {
        /// Dice notation, e.g. "3d6+2" or "2d8 + 1d4 - 3"
        expression: String,
        /// Number of iterations to roll
        #[arg(short = 'n', long)]
        iterations: Option<u64>,
        /// Seed for reproducible rolls
        #[arg(short, long)]
        seed: Option<u64>,
        /// List every individual die face
        #[arg(short, long)]
        verbose: bool,
        /// Show the full statistics block
        #[arg(long)]
        stats: bool,
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
        /// Skip writing this run to the history file
        #[arg(long)]
        no_save: bool,
    },
    /// Exact probability distribution of an expression, no sampling
    Analyze {
        expression: String,
        /// Include std dev and percentiles
        #[arg(short, long)]
        extended: bool,
        #[arg(long)]
        json: bool,
    },
    /// Closed-form facts about an expression without rolling it
    Info {
        expression: String,
        #[arg(long)]
        json: bool,
    },
    /// Show or clear recorded roll sessions
    History {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        clear: bool,
    },
    /// Show or change persisted defaults
    Config {
        /// Configuration key to change
        #[arg(long = "set")]
        set_key: Option<String>,
        /// Value for --set
        #[arg(long)]
        value: Option<String>,
        /// Reset the configuration to defaults
        #[arg(long)]
        reset: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse_from(normalized_args());
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Lets `dice-average 3d6+2` work without spelling out `roll`: when the
/// first argument is neither a known subcommand nor a flag, `roll` is
/// inserted in front of it.
fn normalized_args() -> Vec<String> {
    let mut args: Vec<String> = env::args().collect();
    const SUBCOMMANDS: [&str; 5] = ["roll", "analyze", "info", "history", "config"];
    if let Some(first) = args.get(1) {
        if !SUBCOMMANDS.contains(&first.as_str()) && !first.starts_with('-') {
            args.insert(1, "roll".into());
        }
    }
    args
}

fn run(cli: Cli) -> Result<(), Error> {
    let store = ConfigStore::new(ConfigStore::default_dir());
    match cli.command {
        Command::Roll {
            expression,
            iterations,
            seed,
            verbose,
            stats,
            json,
            no_save,
        } => {
            let config = store.load().with_env_overrides();
            let iterations = iterations.unwrap_or(config.default_iterations);
            let seed = seed.or(config.default_seed);

            let expr = parse(&expression)?;
            let (records, summary) = evaluate(&expr, iterations, seed)?;

            if !no_save {
                let history_store = HistoryStore::new(store.dir());
                let mut history = history_store.load();
                history.add(
                    RollSession::from_summary(&expr.to_string(), seed, &summary),
                    config.history_limit,
                );
                history_store.save(&history)?;
            }

            if json || config.output_format == OutputFormat::Json {
                let payload = json!({
                    "expression": expr.to_string(),
                    "iterations": iterations,
                    "seed": seed,
                    "results": records.iter().map(|r| r.total).collect::<Vec<_>>(),
                    "summary": summary,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                print!(
                    "{}",
                    display::roll_result(
                        &expr,
                        &records,
                        &summary,
                        verbose || config.verbose,
                        stats || config.show_stats,
                    )
                );
            }
            Ok(())
        }

        Command::Analyze {
            expression,
            extended,
            json,
        } => {
            let expr = parse(&expression)?;
            let dist = Distribution::of(&expr)?;
            if json {
                let pmf: Vec<serde_json::Value> = dist
                    .pmf()
                    .iter()
                    .map(|(v, p)| json!({ "value": v, "probability": p.to_string() }))
                    .collect();
                let mut payload = json!({
                    "expression": expr.to_string(),
                    "min": dist.min(),
                    "max": dist.max(),
                    "theoretical_mean": dist.mean_f64(),
                    "median": dist.median(),
                    "modes": dist.modes(),
                    "distribution": pmf,
                });
                if extended {
                    payload["std_dev"] = json!(dist.std_dev_f64());
                    payload["skewness"] = json!(dist.skewness());
                    payload["kurtosis"] = json!(dist.kurtosis());
                }
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                print!("{}", display::analysis(&expr, &dist, extended));
            }
            Ok(())
        }

        Command::Info { expression, json } => {
            let info = parse(&expression)?.info();
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                print!("{}", display::info(&info));
            }
            Ok(())
        }

        Command::History { limit, clear } => {
            let history_store = HistoryStore::new(store.dir());
            if clear {
                history_store.clear()?;
                println!("history cleared");
            } else {
                print!("{}", display::history(&history_store.load(), limit));
            }
            Ok(())
        }

        Command::Config {
            set_key,
            value,
            reset,
        } => {
            match (set_key, value, reset) {
                (_, _, true) => {
                    store.reset()?;
                    println!("configuration reset to defaults");
                }
                (Some(key), Some(value), _) => {
                    let mut config = store.load();
                    config.set(&key, &value)?;
                    store.save(&config)?;
                    println!("{key} = {value}");
                }
                (Some(_), None, _) | (None, Some(_), _) => {
                    return Err(Error::Validation(
                        "--set and --value must be used together".into(),
                    ));
                }
                (None, None, false) => {
                    let config: AppConfig = store.load();
                    print!("{}", display::config(&config, store.dir()));
                }
            }
            Ok(())
        }
    }
}
