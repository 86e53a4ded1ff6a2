// File: src/controller.rs
//! Drives the commands: load and reconcile the dump, authorize, import,
//! revert. Everything user-facing is printed from here.
use crate::cli::{CliArgs, Command, print_help};
use crate::client::{AuthState, Importer, RtmClient, SyncReport, TaskService};
use crate::config::Config;
use crate::context::{AppContext, StandardContext};
use crate::journal::{ImportRecord, Journal};
use crate::model::display::invalid_objects;
use crate::model::{Database, DatabaseSummary, ReconcileWarning};
use crate::storage::LocalStorage;
use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};

/// Parses and reconciles the configured Database.xml.
pub fn load_database(config: &Config) -> Result<(Database, Vec<ReconcileWarning>)> {
    let mut db = Database::load(&config.database_path, &config.default_list_name)?;
    let warnings = db.reconcile(&config.ignored_tag_set())?;
    Ok((db, warnings))
}

pub fn print_database_report(db: &Database) {
    println!("{}", DatabaseSummary::from_database(db));
    let invalid: Vec<_> = invalid_objects(db).collect();
    if !invalid.is_empty() {
        println!("Invalid tasks in Database.xml:");
        for obj in invalid {
            println!("  {}", obj);
        }
    }
}

/// Makes sure `client` holds a working token, asking the user to approve
/// access in a browser when the cached one is missing or rejected.
pub async fn authorize(
    client: &mut RtmClient,
    ctx: &dyn AppContext,
    input: &mut dyn BufRead,
) -> Result<()> {
    let cached = LocalStorage::load_token(ctx);
    let state = client
        .begin_auth(cached.as_deref())
        .await
        .context("Authorization failed")?;

    match state {
        AuthState::Authorized { .. } => Ok(()),
        AuthState::AwaitingApproval { frob, url } => {
            if cached.is_some() {
                LocalStorage::clear_token(ctx)?;
            }
            println!("Please open this URL in your browser and allow access:");
            println!("{}", url);
            print!("Press ENTER after you authorized this program");
            io::stdout().flush()?;
            let mut line = String::new();
            input.read_line(&mut line)?;

            let token = client
                .complete_auth(&frob)
                .await
                .context("Authorization was not granted")?;
            LocalStorage::save_token(ctx, &token)?;
            log::info!("Saved new authorization token");
            Ok(())
        }
    }
}

/// Imports every eligible task of `db` and journals what was created.
pub async fn migrate<S: TaskService>(
    service: &S,
    db: &Database,
    config: &Config,
    ctx: &dyn AppContext,
) -> Result<SyncReport> {
    let mut importer = Importer::connect(service, config.dry_run)
        .await
        .context("Failed to read existing tasks")?;
    println!(
        "Remember The Milk has {} task series in {} lists",
        importer.series_count(),
        importer.list_count()
    );
    if importer.is_dry_run() {
        println!("Dry run: created tasks are deleted again");
    }

    let result = importer.run(service, db).await;
    // Tasks created before a fatal error still belong to this batch.
    Journal::extend(ctx, importer.take_imported())?;
    result
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct RevertReport {
    pub deleted: usize,
    pub failed: usize,
}

/// Deletes every journaled task. Records whose deletion failed stay in the journal.
pub async fn revert<S: TaskService>(service: &S, ctx: &dyn AppContext) -> Result<RevertReport> {
    let journal = Journal::load(ctx);
    if journal.is_empty() {
        return Ok(RevertReport::default());
    }

    let timeline = service
        .create_timeline()
        .await
        .context("Failed to create a timeline")?;
    let mut report = RevertReport::default();
    let mut remaining: Vec<ImportRecord> = Vec::new();
    for record in journal.imported {
        println!("Deleting task {}", record.task.name);
        match service.delete_task(&timeline, &record.task).await {
            Ok(()) => report.deleted += 1,
            Err(e) => {
                log::error!("Could not delete {}: {}", record.task.name, e);
                report.failed += 1;
                remaining.push(record);
            }
        }
    }

    Journal::modify(ctx, |records| *records = remaining)?;
    Ok(report)
}

async fn connect(config: &Config, ctx: &dyn AppContext) -> Result<RtmClient> {
    let mut client = RtmClient::from_config(config).map_err(|e| anyhow::anyhow!(e))?;
    let stdin = io::stdin();
    authorize(&mut client, ctx, &mut stdin.lock()).await?;
    Ok(client)
}

/// Entry point behind the binary.
pub async fn run(args: CliArgs) -> Result<()> {
    if args.command == Command::Help {
        print_help("things2rtm");
        return Ok(());
    }

    let ctx = StandardContext::new(args.root.clone());
    let mut config = Config::load_or_default(&ctx)?;
    config.apply(&args.overrides);

    match args.command {
        Command::Help => {}
        Command::Summary => {
            let (db, _) = load_database(&config)?;
            print_database_report(&db);
        }
        Command::Migrate => {
            let (db, _) = load_database(&config)?;
            print_database_report(&db);
            if !config.has_credentials() {
                anyhow::bail!(
                    "api_key and shared_secret are missing, add them to {}",
                    Config::get_path_string(&ctx)?
                );
            }
            let client = connect(&config, &ctx).await?;
            let report = migrate(&client, &db, &config, &ctx).await?;
            println!("{}", report);
            println!("Done");
        }
        Command::Revert => {
            if Journal::load(&ctx).is_empty() {
                println!("Nothing to revert");
                return Ok(());
            }
            let client = connect(&config, &ctx).await?;
            let report = revert(&client, &ctx).await?;
            println!("Deleted {} tasks", report.deleted);
            if report.failed > 0 {
                println!("{} tasks could not be deleted and remain in the journal", report.failed);
            }
            println!("Done");
        }
    }
    Ok(())
}
