// File: ./src/cli.rs
//! Command-line parsing and help text.
use crate::config::Overrides;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Command {
    /// Import Database.xml into Remember The Milk.
    #[default]
    Migrate,
    /// Print what Database.xml contains, offline.
    Summary,
    /// Delete every task recorded by earlier imports.
    Revert,
    Help,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgs {
    pub command: Command,
    pub root: Option<PathBuf>,
    pub overrides: Overrides,
    pub verbose: bool,
}

/// Parses everything after the binary name.
pub fn parse_args(args: &[String]) -> Result<CliArgs, String> {
    let mut parsed = CliArgs::default();
    let mut command_seen = false;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" | "help" => {
                parsed.command = Command::Help;
                return Ok(parsed);
            }
            "--root" | "-r" => {
                parsed.root = Some(take_value(args, &mut i)?.into());
            }
            "--db" => {
                parsed.overrides.database_path = Some(take_value(args, &mut i)?.into());
            }
            "--list" => {
                parsed.overrides.default_list_name = Some(take_value(args, &mut i)?);
            }
            "--dry-run" | "-n" => parsed.overrides.dry_run = true,
            "--verbose" | "-v" => parsed.verbose = true,
            "summary" | "revert" if !command_seen => {
                parsed.command = if args[i] == "summary" {
                    Command::Summary
                } else {
                    Command::Revert
                };
                command_seen = true;
            }
            other => return Err(format!("Unexpected argument '{}'", other)),
        }
        i += 1;
    }
    Ok(parsed)
}

fn take_value(args: &[String], i: &mut usize) -> Result<String, String> {
    let flag = &args[*i];
    match args.get(*i + 1) {
        Some(value) if !value.starts_with('-') => {
            *i += 1;
            Ok(value.clone())
        }
        _ => Err(format!("{} needs a value", flag)),
    }
}

pub fn print_help(binary_name: &str) {
    println!(
        "things2rtm v{} - Copy your Things to-dos into Remember The Milk",
        env!("CARGO_PKG_VERSION")
    );
    println!();
    println!("USAGE:");
    println!(
        "    {} [--root <dir>] [--db <path>] [--list <name>] [--dry-run] [--verbose]",
        binary_name
    );
    println!("    {} summary [--root <dir>] [--db <path>]", binary_name);
    println!("    {} revert [--root <dir>]", binary_name);
    println!("    {} --help", binary_name);
    println!();
    println!("OPTIONS:");
    println!("    -r, --root <dir>      Use a different directory for config and data.");
    println!("    --db <path>           Read this Database.xml instead of the configured one.");
    println!("    --list <name>         List for to-dos outside any project (default: Inbox).");
    println!("    -n, --dry-run         Create each task, then delete it again.");
    println!("    -v, --verbose         Log every API call to stderr.");
    println!("    -h, --help            Show this help message.");
    println!();
    println!("COMMANDS:");
    println!("    summary               Show counts and invalid to-dos without connecting.");
    println!("    revert                Delete every task a previous import created.");
    println!();
    println!("CONFIG:");
    println!("    api_key and shared_secret must be set in config.toml before the first import.");
    println!("    Imported tasks are tagged 'things2rtm'.");
}
