use clap::{Arg, ArgAction, Command as ClapCommand};
use eci::{unparse, CompileError, Config, Diagnostic, Engine, Grammar, RuntimeError};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
enum DriverError {
    #[error("cannot read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Config(#[from] eci::config::ConfigError),
    #[error("unknown grammar '{0}' (expected cpp or js)")]
    Grammar(String),
    #[error("cannot serialise output: {0}")]
    Json(#[from] serde_json::Error),
    /// Already reported with its source excerpt.
    #[error("{0}")]
    Reported(String),
}

fn main() {
    if let Err(e) = run() {
        match e {
            DriverError::Reported(report) => eprint!("{}", report),
            other => eprintln!("Error: {}", other),
        }
        std::process::exit(1);
    }
}

fn run() -> Result<(), DriverError> {
    let matches = ClapCommand::new("eci")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Run C++-like and JS-like scripts")
        .arg(
            Arg::new("input")
                .help("Script to run")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("grammar")
                .short('g')
                .long("grammar")
                .help("cpp or js; defaults from the file extension"),
        )
        .arg(
            Arg::new("entry")
                .short('e')
                .long("entry")
                .help("Function to call after the top-level statements"),
        )
        .arg(
            Arg::new("emit")
                .long("emit")
                .help("What to produce")
                .value_parser(["run", "ast", "pretty"])
                .default_value("run"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help("JSON configuration file"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Report errors as JSON")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Debug logging")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let default_level = if matches.get_flag("verbose") { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let input = matches
        .get_one::<String>("input")
        .cloned()
        .unwrap_or_default();
    let grammar = match matches.get_one::<String>("grammar").map(String::as_str) {
        Some("cpp") | Some("c++") => Grammar::Cpp,
        Some("js") => Grammar::Js,
        Some(other) => return Err(DriverError::Grammar(other.to_string())),
        None => Grammar::from_extension(&input),
    };
    let config = match matches.get_one::<String>("config") {
        Some(path) => Config::load(Path::new(path))?,
        None => Config::default(),
    };
    let json = matches.get_flag("json");

    let source = fs::read_to_string(&input).map_err(|source| DriverError::Io {
        path: input.clone(),
        source,
    })?;

    let emit = matches
        .get_one::<String>("emit")
        .map(String::as_str)
        .unwrap_or("run");
    match emit {
        "ast" | "pretty" => {
            let program = eci::parser::parse(&source, grammar)
                .map_err(|err| compile_failure(&CompileError::from(err), &source, json))?;
            if emit == "ast" {
                println!("{}", serde_json::to_string_pretty(&program)?);
            } else {
                print!("{}", unparse(&program, grammar));
            }
            Ok(())
        }
        _ => {
            let mut engine = Engine::new(config);
            let unit = engine
                .compile(&source, grammar)
                .map_err(|err| compile_failure(&err, &source, json))?;
            let entry = matches.get_one::<String>("entry").map(String::as_str);
            let value = engine
                .execute(&unit, entry, Vec::new())
                .map_err(|err| runtime_failure(&err, &source, json))?;
            tracing::debug!(result = %value, "script finished");
            Ok(())
        }
    }
}

fn compile_failure(err: &CompileError, source: &str, json: bool) -> DriverError {
    report(Diagnostic::from(err), source, json)
}

fn runtime_failure(err: &RuntimeError, source: &str, json: bool) -> DriverError {
    report(Diagnostic::from(err), source, json)
}

fn report(diagnostic: Diagnostic, source: &str, json: bool) -> DriverError {
    if json {
        match serde_json::to_string(&diagnostic) {
            Ok(text) => DriverError::Reported(format!("{}\n", text)),
            Err(err) => DriverError::Json(err),
        }
    } else {
        DriverError::Reported(diagnostic.render(source))
    }
}
