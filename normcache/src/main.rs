//! `normcache`: apply results to and read views from a normalized cache
//! snapshot, driven by operation metadata artifacts.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};

use normcache::commands::{self, ReadReport};
use normcache::exit_codes;
use normcache::io::artifact::Encoding;
use normcache::io::config::{CONFIG_FILE, CacheConfig, load_config};
use normcache::logging;

#[derive(Parser)]
#[command(
    name = "normcache",
    version,
    about = "Normalized object cache for graph-shaped query results"
)]
struct Cli {
    /// Config file (TOML); defaults apply when it does not exist.
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check a metadata artifact against the schema and invariants.
    Validate {
        #[arg(long)]
        meta: PathBuf,
    },
    /// Normalize a result into the snapshot and print the change counters.
    Write {
        #[arg(long)]
        meta: PathBuf,
        /// Operation name within the artifact.
        #[arg(long)]
        op: String,
        /// Result JSON: the data object or a `{ data, errors }` envelope.
        #[arg(long)]
        result: PathBuf,
        #[arg(long)]
        vars: Option<PathBuf>,
        /// Also print the projected view.
        #[arg(long)]
        print_view: bool,
    },
    /// Project an operation's view out of the snapshot.
    Read {
        #[arg(long)]
        meta: PathBuf,
        #[arg(long)]
        op: String,
        #[arg(long)]
        vars: Option<PathBuf>,
    },
    /// Derive a cache key from an identity rule and a JSON object.
    Key {
        #[arg(long)]
        rule: String,
        #[arg(long)]
        object: String,
    },
    /// Print the argument fingerprint of a template.
    Fingerprint {
        #[arg(long)]
        args: String,
        #[arg(long)]
        vars: Option<PathBuf>,
    },
    /// Emit one operation's metadata as an embeddable payload.
    Encode {
        #[arg(long)]
        meta: PathBuf,
        #[arg(long)]
        op: String,
        #[arg(long)]
        base64: bool,
    },
    /// Check an embedded payload and print the metadata it carries.
    Decode {
        #[arg(long)]
        payload: PathBuf,
        #[arg(long)]
        base64: bool,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Validate { meta } => {
            let names = commands::validate_artifact(&meta)?;
            println!("ok: {} operation(s)", names.len());
            Ok(exit_codes::OK)
        }
        Command::Write {
            meta,
            op,
            result,
            vars,
            print_view,
        } => {
            let cfg = load_config(&cli.config)?;
            let report = commands::write_operation(&cfg, &meta, &op, &result, vars.as_deref())?;
            println!("added={} updated={}", report.added, report.updated);
            if print_view {
                println!("{}", commands::render_json(&report.view, cfg.pretty)?);
            }
            Ok(exit_codes::OK)
        }
        Command::Read { meta, op, vars } => {
            let cfg = load_config(&cli.config)?;
            cmd_read(&cfg, &meta, &op, vars.as_deref())
        }
        Command::Key { rule, object } => {
            println!("{}", commands::cache_key(&rule, &object)?);
            Ok(exit_codes::OK)
        }
        Command::Fingerprint { args, vars } => {
            println!("{}", commands::fingerprint(&args, vars.as_deref())?);
            Ok(exit_codes::OK)
        }
        Command::Encode { meta, op, base64 } => {
            let encoding = if base64 { Encoding::Base64 } else { Encoding::Raw };
            println!("{}", commands::encode(&meta, &op, encoding)?);
            Ok(exit_codes::OK)
        }
        Command::Decode { payload, base64 } => {
            let cfg = load_config(&cli.config)?;
            let encoding = if base64 { Encoding::Base64 } else { Encoding::Raw };
            let meta = commands::decode(&payload, encoding)?;
            println!("{}", commands::render_json(&meta, cfg.pretty)?);
            Ok(exit_codes::OK)
        }
    }
}

fn cmd_read(
    cfg: &CacheConfig,
    meta: &Path,
    op: &str,
    vars: Option<&Path>,
) -> Result<i32> {
    match commands::read_operation(cfg, meta, op, vars)? {
        ReadReport::View(view) => {
            println!("{}", commands::render_json(&view, cfg.pretty)?);
            Ok(exit_codes::OK)
        }
        ReadReport::Missing(err) => {
            eprintln!("{err}");
            Ok(exit_codes::MISSING)
        }
    }
}
