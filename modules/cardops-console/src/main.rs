use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cardops_client::{ApplicationEntry, BatchAction, CardOpsClient, CardType, EmbossType};
use cardops_console::action::ActionDialog;
use cardops_console::batches::{self, BatchTab, Pagination, DEFAULT_PAGE_SIZE};
use cardops_console::bulk_file;
use cardops_console::shell::{self, HealthMonitor, HealthStatus};
use cardops_console::staging::{self, EntryMode, PollHandle, PollOutcome, StatusBoard, UploadForm};
use cardops_console::{
    Console, ConsoleApi, ConsoleConfig, ConsoleError, Navigation, NoticeKind, Outcome, Route,
};

#[derive(Parser)]
#[command(name = "cardops", about = "Prepaid card application console")]
#[command(version)]
struct Cli {
    /// Backend API base URL
    #[arg(long, global = true, env = "CARDOPS_API_URL")]
    api_url: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true, env = "CARDOPS_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check backend health
    Health,

    /// Show the signed-in user
    Whoami,

    /// List corporates
    Corporates,

    /// List active products of the selected corporate
    Products {
        /// Corporate code to select first
        #[arg(long)]
        corporate: Option<String>,
    },

    /// Write the sample bulk file
    SampleCsv {
        #[arg(long, default_value = bulk_file::SAMPLE_FILE_NAME)]
        output: PathBuf,
    },

    /// Upload applications and start validation
    #[command(group(clap::ArgGroup::new("source").required(true).args(["file", "entry_json"])))]
    Stage {
        #[arg(long)]
        product: String,

        #[arg(long, value_enum, default_value_t = CardTypeArg::Virtual)]
        card_type: CardTypeArg,

        #[arg(long, value_enum, default_value_t = EmbossTypeArg::Personalized)]
        emboss_type: EmbossTypeArg,

        /// Bulk file (.csv, .xls, .xlsx)
        #[arg(long)]
        file: Option<PathBuf>,

        /// Single application as JSON
        #[arg(long)]
        entry_json: Option<String>,

        /// Keep watching validation after staging
        #[arg(long)]
        watch: bool,
    },

    /// Follow validation of a staging batch
    Watch { id: i64 },

    /// Download the error report of a staging batch
    Errors {
        id: i64,

        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Submit the valid records of a staging batch
    Submit { id: i64 },

    /// List past staging batches
    Drafts {
        #[arg(long, default_value_t = 0)]
        page: u32,

        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        size: u32,
    },

    /// List submitted batches
    Batches {
        #[arg(long, default_value = "pending")]
        tab: BatchTab,

        #[arg(long, default_value_t = 0)]
        page: u32,

        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        size: u32,
    },

    /// Show a batch, or one application of it
    Applications {
        batch_id: i64,
        application_id: Option<i64>,

        #[arg(long, default_value_t = 0)]
        page: u32,
    },

    /// Approve, reject or cancel a pending batch
    Action {
        batch_id: i64,

        #[arg(value_enum)]
        action: ActionArg,

        #[arg(long)]
        reason: Option<String>,
    },

    /// Pending count and recent batches
    Dashboard,
}

#[derive(Clone, Copy, ValueEnum)]
enum CardTypeArg {
    Virtual,
    Physical,
}

impl From<CardTypeArg> for CardType {
    fn from(arg: CardTypeArg) -> Self {
        match arg {
            CardTypeArg::Virtual => CardType::Virtual,
            CardTypeArg::Physical => CardType::Physical,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum EmbossTypeArg {
    Personalized,
    NonPersonalized,
}

impl From<EmbossTypeArg> for EmbossType {
    fn from(arg: EmbossTypeArg) -> Self {
        match arg {
            EmbossTypeArg::Personalized => EmbossType::Personalized,
            EmbossTypeArg::NonPersonalized => EmbossType::NonPersonalized,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ActionArg {
    Approve,
    Reject,
    Cancel,
}

impl From<ActionArg> for BatchAction {
    fn from(arg: ActionArg) -> Self {
        match arg {
            ActionArg::Approve => BatchAction::Approve,
            ActionArg::Reject => BatchAction::Reject,
            ActionArg::Cancel => BatchAction::Cancel,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_json)?;

    let mut config = ConsoleConfig::from_env()?;
    if let Some(url) = cli.api_url {
        config.api_url = url;
    }

    if let Command::SampleCsv { output } = &cli.command {
        std::fs::write(output, bulk_file::sample_csv()?)
            .with_context(|| format!("writing {}", output.display()))?;
        println!("Sample written to {}", output.display());
        return Ok(());
    }

    let client = CardOpsClient::with_timeout(&config.api_url, &config.health_url, config.request_timeout)?;
    let console = Console::new(Arc::new(client), config);

    if let Command::Health = cli.command {
        let status = shell::check_health(console.api.as_ref()).await;
        println!("{status:?}");
        return Ok(());
    }

    console.start().await?;
    run(&console, cli.command).await
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("cardops=info".parse()?);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

async fn run(console: &Console, command: Command) -> Result<()> {
    let api = console.api.as_ref();

    match command {
        Command::Health | Command::SampleCsv { .. } => Ok(()),

        Command::Whoami => {
            let session = console.enter(&Route::Dashboard)?;
            let Some(user) = &session.user else {
                bail!(ConsoleError::Unauthenticated);
            };
            println!("{} <{}>", user.full_name, user.email);
            println!("roles: {}", user.roles.join(", "));
            match &session.selected_corporate {
                Some(c) => println!("corporate: {} ({})", c.name, c.code),
                None => println!("corporate: <none selected>"),
            }
            for item in shell::navigation(&session) {
                println!("  {:<20} {}", item.title, item.route);
            }
            Ok(())
        }

        Command::Corporates => {
            console.enter(&Route::Dashboard)?;
            for c in api.list_corporates().await? {
                let marker = if c.is_default { "*" } else { " " };
                println!("{marker} {:<6} {:<12} {}", c.id, c.code, c.name);
            }
            Ok(())
        }

        Command::Products { corporate } => {
            console.enter(&Route::CreateApplication)?;
            if let Some(code) = corporate {
                console.session.select_corporate_by_code(&code)?;
            }
            let corporate = console.selected_corporate()?;
            for p in staging::active_products(api, &corporate).await? {
                println!("{:<12} {}", p.product_code, p.product_name);
            }
            Ok(())
        }

        Command::Stage {
            product,
            card_type,
            emboss_type,
            file,
            entry_json,
            watch,
        } => {
            let session = console.enter(&Route::CreateApplication)?;
            console.require_permission("applications.create")?;

            let corporate = console.selected_corporate()?;
            let offered = staging::active_products(api, &corporate).await?;
            let mut form = UploadForm::for_session(&session)?;
            form.select_product(&offered, &product)?;
            form.card_type = card_type.into();
            form.emboss_type = emboss_type.into();

            if let Some(path) = file {
                form.mode = EntryMode::Bulk;
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .context("bulk file needs a UTF-8 file name")?
                    .to_string();
                let contents = tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("reading {}", path.display()))?;
                settle(form.upload(api, &console.session, &name, contents).await?)?;
            } else if let Some(json) = entry_json {
                form.mode = EntryMode::Single;
                form.entry = serde_json::from_str::<ApplicationEntry>(&json)
                    .context("parsing --entry-json")?;
            }

            let outcome = form.submit(api, &console.session).await?;
            for (field, message) in &form.field_errors {
                eprintln!("  {field}: {message}");
            }
            match settle(outcome)? {
                Navigation::To(Route::StagingStatus(id)) => {
                    println!("Staging batch {id} created");
                    if watch {
                        watch_batch(console, id).await?;
                    }
                    Ok(())
                }
                other => bail!("unexpected navigation after staging: {other:?}"),
            }
        }

        Command::Watch { id } => {
            console.enter(&Route::StagingStatus(id))?;
            watch_batch(console, id).await
        }

        Command::Errors { id, dir } => {
            console.enter(&Route::StagingStatus(id))?;
            let dir = dir.unwrap_or_else(|| console.config.download_dir.clone());
            settle(staging::download_error_report(api, &console.session, id, &dir).await)?;
            Ok(())
        }

        Command::Submit { id } => {
            console.enter(&Route::StagingStatus(id))?;
            settle(staging::submit_batch(api, &console.session, id).await?)?;
            Ok(())
        }

        Command::Drafts { page, size } => {
            console.enter(&Route::Applications)?;
            let list = batches::load_drafts(api, page, size).await?;
            for d in &list.drafts {
                println!(
                    "{:<8} {:<11} total {:<5} valid {:<5} invalid {:<5} {}",
                    d.draft_id,
                    d.status,
                    d.total_count,
                    d.valid_count,
                    d.invalid_count,
                    d.created_at.as_deref().unwrap_or("")
                );
            }
            print_pagination(&list.pagination);
            Ok(())
        }

        Command::Batches { tab, page, size } => {
            console.enter(&Route::Applications)?;
            console.require_permission("applications.view")?;
            let list = batches::load_batches(api, tab, page, size).await?;
            for b in &list.batches {
                print_batch(b);
            }
            print_pagination(&list.pagination);
            Ok(())
        }

        Command::Applications {
            batch_id,
            application_id: Some(application_id),
            ..
        } => {
            console.enter(&Route::ApplicationDetails {
                batch_id,
                application_id,
            })?;
            let record = batches::load_application(api, batch_id, application_id).await?;
            println!("{}", serde_json::to_string_pretty(&record.application)?);
            println!("status: {}", record.status);
            if let Some(reason) = &record.failure_reason {
                println!("failure: {reason}");
            }
            Ok(())
        }

        Command::Applications {
            batch_id,
            application_id: None,
            page,
        } => {
            let session = console.enter(&Route::BatchDetails(batch_id))?;
            let details = batches::load_batch_details(api, batch_id, page, DEFAULT_PAGE_SIZE).await?;
            print_batch(&details.batch);
            for a in &details.applications {
                println!(
                    "  {:<8} {:<18} {:<24} {}",
                    a.id,
                    a.status,
                    a.name.as_deref().unwrap_or(""),
                    a.failure_reason.as_deref().unwrap_or("")
                );
            }
            print_pagination(&details.pagination);
            let actions = details.available_actions(&session);
            if !actions.is_empty() {
                let names: Vec<&str> = actions.iter().map(|a| a.as_str()).collect();
                println!("available actions: {}", names.join(", "));
            }
            Ok(())
        }

        Command::Action {
            batch_id,
            action,
            reason,
        } => {
            let session = console.enter(&Route::BatchDetails(batch_id))?;
            let action = BatchAction::from(action);
            let details = batches::load_batch_details(api, batch_id, 0, 1).await?;
            if !details.available_actions(&session).contains(&action) {
                bail!(ConsoleError::NotAllowed(format!(
                    "{action} is not available for batch {batch_id} ({})",
                    details.batch.status
                )));
            }

            let mut dialog = ActionDialog::new(batch_id);
            dialog.open(action);
            if let Some(reason) = reason {
                dialog.set_reason(reason);
            }
            if !dialog.can_confirm() {
                bail!("{action} requires --reason");
            }
            settle(dialog.confirm(api, &console.session).await?)?;
            println!("{action} applied to batch {batch_id}");
            Ok(())
        }

        Command::Dashboard => {
            console.enter(&Route::Dashboard)?;
            console.require_permission("dashboard.view")?;
            let dashboard = batches::load_dashboard(api).await?;
            println!("Pending approval: {}", dashboard.pending_count);
            println!("Recent batches:");
            for b in &dashboard.recent {
                print_batch(b);
            }
            Ok(())
        }
    }
}

/// Follow a staging batch until validation ends or Ctrl-C.
async fn watch_batch(console: &Console, id: i64) -> Result<()> {
    let mut handle = PollHandle::spawn(console.api.clone(), id, console.config.poll_interval);
    let monitor = HealthMonitor::spawn(console.api.clone(), console.config.health_interval);

    loop {
        let changed = tokio::select! {
            _ = tokio::signal::ctrl_c() => None,
            changed = handle.changed() => Some(changed),
        };
        match changed {
            None => {
                info!(batch_id = id, "Interrupted");
                handle.stop();
                break;
            }
            Some(false) => break,
            Some(true) => {
                print_board(&handle.board());
                if monitor.status() == HealthStatus::Down {
                    warn!("Backend health check is failing");
                }
            }
        }
    }

    let board = handle.board();
    match handle.finish().await {
        Ok(PollOutcome::Terminal(_)) => {
            if board.show_error_report() {
                println!("Error report available: cardops errors {id}");
            }
            if board.can_submit(false) {
                println!("Ready to submit: cardops submit {id}");
            }
            Ok(())
        }
        Ok(PollOutcome::Cancelled) => {
            println!("Stopped watching batch {id}");
            Ok(())
        }
        Err(ConsoleError::Api(e)) if console.session.on_api_error(&e).is_some() => {
            bail!("Session expired, sign in again")
        }
        Err(e) => Err(e.into()),
    }
}

/// Print an outcome's notices. Fails when any of them is an error.
fn settle(outcome: Outcome) -> Result<Navigation> {
    let mut failure = None;
    for notice in &outcome.notices {
        match notice.kind {
            NoticeKind::Success => println!("{}: {}", notice.title, notice.description),
            NoticeKind::Error => {
                eprintln!("{}: {}", notice.title, notice.description);
                failure.get_or_insert_with(|| notice.title.clone());
            }
        }
    }
    if let Navigation::To(Route::Login) = outcome.navigation {
        bail!("Session expired, sign in again");
    }
    match failure {
        Some(title) => bail!(title),
        None => Ok(outcome.navigation),
    }
}

fn print_board(board: &StatusBoard) {
    match board.latest() {
        Some(s) => println!(
            "batch {}: {} (total {}, valid {}, invalid {})",
            board.batch_id(),
            s.status,
            s.total_count,
            s.valid_count,
            s.invalid_count
        ),
        None => println!("batch {}: waiting for status", board.batch_id()),
    }
}

fn print_batch(b: &cardops_client::ApplicationBatch) {
    println!(
        "{:<8} {:<22} {:<16} {:<6} {}",
        b.batch_id,
        b.status,
        b.product_name.as_deref().unwrap_or(""),
        b.total_records,
        b.created_at.as_deref().unwrap_or("")
    );
}

fn print_pagination(p: &Pagination) {
    println!("{}", p.summary());
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn stage_needs_exactly_one_source() {
        assert!(Cli::try_parse_from(["cardops", "stage", "--product", "GIFT"]).is_err());
        assert!(Cli::try_parse_from([
            "cardops", "stage", "--product", "GIFT", "--file", "a.csv", "--entry-json", "{}"
        ])
        .is_err());
        assert!(Cli::try_parse_from(["cardops", "stage", "--product", "GIFT", "--file", "a.csv"]).is_ok());
    }

    #[test]
    fn batches_tab_parses() {
        let cli = Cli::try_parse_from(["cardops", "batches", "--tab", "rejected"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Batches {
                tab: BatchTab::Rejected,
                ..
            }
        ));
    }
}
