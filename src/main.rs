//! hintcheck - check values against type hints from the command line.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use hintcheck::prelude::*;
use log::LevelFilter;

/// Command-line interface for hintcheck.
#[derive(Parser, Debug)]
#[command(
    name = "hintcheck",
    version,
    about = "Runtime type checks synthesized from type hints",
    long_about = None
)]
struct Cli {
    /// Sets the verbosity level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed for container sampling, for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Check a JSON value against a type hint
    Check {
        /// Type hint, e.g. "dict[str, list[int]]"
        #[arg(long)]
        hint: String,

        /// JSON value to check
        #[arg(long)]
        value: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the wrapper source generated for a signature
    Source {
        /// Function name
        #[arg(long, default_value = "func")]
        name: String,

        /// Parameter as name:hint; repeatable
        #[arg(long = "param")]
        params: Vec<String>,

        /// Return hint
        #[arg(long)]
        returns: Option<String>,
    },
}

fn setup_logging(level: &str) -> Result<()> {
    let log_level = match level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Warn,
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    Ok(())
}

fn load_conf(path: Option<&Path>, seed: Option<u64>) -> Result<Conf> {
    let conf = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {:?}", path))?;
            serde_json::from_str(&text)
                .with_context(|| format!("failed to parse config {:?}", path))?
        },
        None => Conf::default(),
    };
    Ok(match seed {
        Some(seed) => conf.with_index_source(SeededSource::with_seed(seed)),
        None => conf,
    })
}

fn check(conf: &Conf, hint: &str, value: &str, format: &str) -> Result<bool> {
    let module = Namespace::new("__main__");
    let hint = parse_hint(hint, &module)?;
    let json: serde_json::Value =
        serde_json::from_str(value).with_context(|| format!("invalid JSON value {:?}", value))?;

    let func = Function::new("check", &module, |args: &Args| {
        Ok(args.get(0, "value").cloned().unwrap_or(Value::None))
    })
    .param(Param::positional("value", hint));
    let checked = decorate(&func, conf)?;
    for warning in checked.warnings() {
        eprintln!("warning: {}", warning);
    }

    match checked.call_with([Value::from(json)]) {
        Ok(_) => {
            match format {
                "json" => println!("{}", serde_json::json!({ "ok": true })),
                _ => println!("ok"),
            }
            Ok(true)
        },
        Err(Error::Violation(violation)) => {
            match format {
                "json" => println!("{}", serde_json::to_string_pretty(&violation)?),
                _ => println!("{}", violation),
            }
            Ok(false)
        },
        Err(err) => Err(err.into()),
    }
}

fn source(conf: Conf, name: &str, params: &[String], returns: Option<&str>) -> Result<()> {
    let module = Namespace::new("__main__");
    let mut func = Function::new(name, &module, |_: &Args| Ok(Value::None));
    for entry in params {
        let (param, hint) = entry
            .split_once(':')
            .ok_or_else(|| anyhow!("expected name:hint, got {:?}", entry))?;
        func = func.param(Param::positional(param.trim(), parse_hint(hint, &module)?));
    }
    if let Some(returns) = returns {
        func = func.returns(parse_hint(returns, &module)?);
    }

    let conf = Conf { is_debug: true, ..conf };
    let wrapper = Decorator::with_registry(conf, hintcheck::compile::Registry::new()).decorate(&func)?;
    match wrapper.source() {
        Some(source) => print!("{}", source),
        None => bail!("{}() has no checkable hints", name),
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    setup_logging(&cli.log_level)?;

    let conf = load_conf(cli.config.as_deref(), cli.seed)?;
    match cli.command {
        Commands::Check { hint, value, format } => {
            if !check(&conf, &hint, &value, &format)? {
                std::process::exit(1);
            }
        },
        Commands::Source { name, params, returns } => {
            source(conf, &name, &params, returns.as_deref())?;
        },
    }

    Ok(())
}
