// Binary entry point for the command-line migration tool.
use anyhow::Result;
use simplelog::{ColorChoice, LevelFilter, TermLogger, TerminalMode};
use std::env;
use things2rtm::cli::parse_args;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let raw: Vec<String> = env::args().skip(1).collect();
    let args = match parse_args(&raw) {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{}", msg);
            eprintln!("Run 'things2rtm --help' for usage.");
            std::process::exit(2);
        }
    };

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    // Only fails when a logger is already installed.
    let _ = TermLogger::init(
        level,
        simplelog::Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    );

    things2rtm::controller::run(args).await
}
