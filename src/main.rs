use clap::{CommandFactory, FromArgMatches, Parser};
use std::ffi::OsString;
use std::path::PathBuf;
use tracing::{info, warn, Level};

use kdump_utils::commands::{self, Session};
use kdump_utils::config::Config;
use kdump_utils::{CommandParser, MemoryDump};

/// Crash dump analysis helpers
#[derive(Parser, Debug)]
#[command(name = "kdump-utils", version, about)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON snapshot of decoded structs, overrides the config file
    #[arg(short, long)]
    snapshot: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Whether `-v`/`--verbose` appears among the global options, i.e. before
/// the subcommand name. Runs ahead of clap so registration is logged too.
fn verbose_requested<I, T>(args: I) -> bool
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut args = args.into_iter().skip(1).map(Into::into);
    while let Some(arg) = args.next() {
        let Some(arg) = arg.to_str() else {
            return false;
        };
        match arg {
            "-v" | "--verbose" => return true,
            "--config" | "--snapshot" => {
                args.next();
            }
            "--" => return false,
            long if long.starts_with("--") => {}
            short if short.starts_with('-') && short.len() > 1 => {
                // Cluster like `-vc FILE`; a value flag consumes the rest.
                for (i, flag) in short.char_indices().skip(1) {
                    match flag {
                        'v' => return true,
                        'c' | 's' => {
                            if i + 1 == short.len() {
                                args.next();
                            }
                            break;
                        }
                        _ => {}
                    }
                }
            }
            _ => return false,
        }
    }
    false
}

fn init_tracing(verbose: bool) {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_max_level(if verbose { Level::DEBUG } else { Level::WARN })
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<OsString> = std::env::args_os().collect();
    init_tracing(verbose_requested(&args));

    let mut parser = CommandParser::new(Cli::command());
    parser.add_subcommand_parsers(&commands::module())?;

    let parsed = parser.parse_from(args);
    let cli = Cli::from_arg_matches(&parsed.global)?;

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    let dump = match cli.snapshot.clone().or_else(|| config.snapshot_path()) {
        Some(path) => MemoryDump::from_json_file(path)?,
        None => {
            warn!("no snapshot given, dump is empty");
            MemoryDump::new()
        }
    };

    info!(command = %parsed.command, structs = dump.len(), "running command");
    let mut session = Session::new(config, dump);
    parsed.invoke(&mut session)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_requested() {
        assert!(verbose_requested(["kdump-utils", "-v", "ps"]));
        assert!(verbose_requested(["kdump-utils", "--verbose", "ps"]));
        assert!(verbose_requested(["kdump-utils", "-c", "kdump.toml", "-v", "ps"]));
        assert!(verbose_requested(["kdump-utils", "--snapshot", "vmcore.json", "--verbose", "ps"]));
        assert!(verbose_requested(["kdump-utils", "-vs", "vmcore.json", "ps"]));
    }

    #[test]
    fn test_verbose_not_requested() {
        assert!(!verbose_requested(["kdump-utils"]));
        assert!(!verbose_requested(["kdump-utils", "ps"]));
        assert!(!verbose_requested(["kdump-utils", "ps", "-v"]));
        assert!(!verbose_requested(["kdump-utils", "-c", "-v", "ps"]));
        assert!(!verbose_requested(["kdump-utils", "-sv", "ps"]));
        assert!(!verbose_requested(["kdump-utils", "--config=kdump.toml", "ps"]));
    }

    #[test]
    fn test_cli_globals_match_scan() {
        Cli::command().debug_assert();
        let cli = Cli::try_parse_from(["kdump-utils", "-c", "kdump.toml", "-v"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("kdump.toml")));
    }
}
