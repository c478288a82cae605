//! cx: command-line front end for the ConfigX store.
//!
//! # Usage
//!
//! ```text
//! cx 'app.ui.theme="dark"' app.ui.theme
//! cx --dir ./state --tree
//! cx --persistent --load-json seed.json --dump
//! echo 'a.b=1; a.b' | cx -p
//! ```

mod args;
mod render;

use std::io::{self, BufRead, IsTerminal, Write};
use std::process;

use configx_core::{ConfigError, ConfigX, Outcome, Settings};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::args::{parse_args, CliArgs, USAGE};
use crate::render::render_tree;

fn main() {
    init_logging();

    let args: Vec<String> = std::env::args().collect();
    let arg_refs: Vec<&str> = args[1..].iter().map(|s| s.as_str()).collect();

    let cli = match parse_args(&arg_refs) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("cx: {}", e);
            eprintln!("Run 'cx --help' for usage.");
            process::exit(2);
        }
    };
    if cli.help {
        println!("{}", USAGE);
        return;
    }

    let settings = match build_settings(&cli) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("cx: {}", e);
            process::exit(1);
        }
    };
    let cx = match ConfigX::open(&settings) {
        Ok(cx) => cx,
        Err(e) => {
            eprintln!("cx: failed to open store: {}", e);
            process::exit(1);
        }
    };

    let mut failed = match run(&cx, &cli) {
        Ok(clean) => !clean,
        Err(e) => {
            eprintln!("cx error: {}", e);
            true
        }
    };
    if let Err(e) = cx.close() {
        eprintln!("cx: failed to close store: {}", e);
        failed = true;
    }
    if failed {
        process::exit(1);
    }
}

/// Log to stderr, filtered by `RUST_LOG` (default `warn`).
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Settings from `--config` (or the environment), then command-line
/// overrides.
fn build_settings(cli: &CliArgs) -> Result<Settings, ConfigError> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::from_env()?,
    };
    if cli.persistent {
        settings.persistent = true;
    }
    if let Some(dir) = &cli.dir {
        settings.storage_dir = Some(dir.clone());
    }
    if let Some(json) = &cli.load_json {
        settings.load_json = Some(json.clone());
    }
    debug!(?settings, "resolved settings");
    Ok(settings)
}

/// Returns `false` when piped input had failing statements.
fn run(cx: &ConfigX, cli: &CliArgs) -> Result<bool, ConfigError> {
    let mut clean = true;
    for query in &cli.queries {
        print_outcome(&cx.resolve(query)?)?;
    }
    if let Some(path) = &cli.script {
        let script = std::fs::read_to_string(path)?;
        for outcome in cx.run_script(&script)? {
            print_outcome(&outcome)?;
        }
    }
    if cli.is_interactive() {
        clean = repl(cx)? == 0;
    }
    if cli.dump {
        println!("{}", serde_json::to_string_pretty(&cx.dump_json())?);
    }
    if cli.tree {
        println!("{}", render_tree(&cx.dump(), !cli.hide_values));
    }
    Ok(clean)
}

/// Reads print as JSON; writes and deletes print nothing.
fn print_outcome(outcome: &Outcome) -> Result<(), ConfigError> {
    match outcome {
        Outcome::Applied => {}
        other => println!("{}", serde_json::to_string_pretty(&other.to_json())?),
    }
    Ok(())
}

/// Line-oriented loop over stdin. Statement errors are reported and the
/// loop continues. `.tree`, `.dump` and `.exit` are meta commands.
/// Returns the number of failed statements when input is piped.
fn repl(cx: &ConfigX) -> Result<usize, ConfigError> {
    let stdin = io::stdin();
    let interactive = stdin.is_terminal();
    let mut errors = 0usize;

    loop {
        if interactive {
            print!("cx> ");
            io::stdout().flush()?;
        }
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        match line.trim() {
            "" => continue,
            ".exit" | ".quit" => break,
            ".tree" => {
                println!("{}", render_tree(&cx.dump(), true));
                continue;
            }
            ".dump" => {
                println!("{}", serde_json::to_string_pretty(&cx.dump_json())?);
                continue;
            }
            _ => {}
        }
        if let Err(e) = run_line(cx, &line) {
            eprintln!("error: {}", e);
            errors += 1;
        }
    }

    Ok(if interactive { 0 } else { errors })
}

fn run_line(cx: &ConfigX, line: &str) -> Result<(), ConfigError> {
    for op in configx_core::parse_script(line)? {
        print_outcome(&cx.execute(op)?)?;
    }
    Ok(())
}
