//! Command-line argument parsing for `cx`.

use std::path::PathBuf;

pub const USAGE: &str = "\
Usage: cx [options] [query ...]

Runs each ConfigXQL query in order. With no queries, --script, --dump or
--tree, reads statements from standard input.

Queries:
  a.b.c            read (fails if missing)
  a.b.c!           safe read (null if missing)
  a.b.c=<value>    write a string (\"..\"), integer, float, true or false
  a.b.c-           delete

Options:
  -d, --dir <path>        persist in <path> (implies --persistent)
  -p, --persistent        persist in ./.configx unless --dir is given
  -c, --config <file>     read settings from a YAML file
      --load-json <file>  ingest a JSON document after opening
  -s, --script <file>     run statements from a file
      --dump              print the whole tree as JSON
      --tree              print the tree as an outline
      --hide-values       with --tree, omit leaf values
  -h, --help              show this help

Environment:
  CONFIGX_DIR         storage directory (enables persistence)
  CONFIGX_LOAD_JSON   JSON document to ingest
  RUST_LOG            log filter (default: warn)";

/// Parsed command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliArgs {
    pub dir: Option<PathBuf>,
    pub persistent: bool,
    pub config: Option<PathBuf>,
    pub load_json: Option<PathBuf>,
    pub script: Option<PathBuf>,
    pub dump: bool,
    pub tree: bool,
    pub hide_values: bool,
    pub help: bool,
    pub queries: Vec<String>,
}

impl CliArgs {
    /// Nothing to do but read statements from stdin.
    pub fn is_interactive(&self) -> bool {
        self.queries.is_empty() && self.script.is_none() && !self.dump && !self.tree
    }
}

/// Parse arguments (without the program name).
pub fn parse_args(args: &[&str]) -> Result<CliArgs, String> {
    let mut out = CliArgs::default();
    let mut i = 0;
    while i < args.len() {
        match args[i] {
            "-d" | "--dir" => {
                i += 1;
                out.dir = Some(take_arg(args, i, "--dir")?.into());
                out.persistent = true;
            }
            "-p" | "--persistent" => out.persistent = true,
            "-c" | "--config" => {
                i += 1;
                out.config = Some(take_arg(args, i, "--config")?.into());
            }
            "--load-json" => {
                i += 1;
                out.load_json = Some(take_arg(args, i, "--load-json")?.into());
            }
            "-s" | "--script" => {
                i += 1;
                out.script = Some(take_arg(args, i, "--script")?.into());
            }
            "--dump" => out.dump = true,
            "--tree" => out.tree = true,
            "--hide-values" => out.hide_values = true,
            "-h" | "--help" => out.help = true,
            "--" => {
                out.queries.extend(args[i + 1..].iter().map(|s| s.to_string()));
                break;
            }
            flag if flag.starts_with("--") => {
                return Err(format!("Unknown option: '{}'", flag));
            }
            query => out.queries.push(query.to_string()),
        }
        i += 1;
    }
    if out.hide_values && !out.tree {
        return Err("--hide-values only applies with --tree".into());
    }
    Ok(out)
}

fn take_arg(args: &[&str], i: usize, flag: &str) -> Result<String, String> {
    args.get(i)
        .map(|s| s.to_string())
        .ok_or_else(|| format!("{} requires a value", flag))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
