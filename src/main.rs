//! `localline` command line.
//!
//! One subcommand per operation. Every run prints a single JSON result
//! envelope on stdout and exits with the status of its result code; logs go
//! to stderr.
//!
//! # Usage
//!
//! ```bash
//! # One-time setup
//! LOCALLINE_USERNAME=hub@example.com LOCALLINE_PASSWORD=... localline auth-bootstrap
//!
//! # Weekly cycle
//! localline auth-status
//! localline picklists-create --start-date 2026-10-16 --end-date 2026-10-22
//! localline orders-export --start-date 2026-10-16 --end-date 2026-10-22 --format csv --output week.csv
//! localline customers-email-proof --subject "Pickup moved" --body "<p>...</p>"
//! localline customers-email-send-all --subject "Pickup moved" --body "<p>...</p>"
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use localline::api::{FulfillmentWeek, Operation};
use localline::{DateRange, Error, LocalLineClient, Outcome, PicklistRequest, Result, Settings};

#[derive(Parser)]
#[command(name = "localline")]
#[command(author, version, about = "Local Line backoffice operations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report whether requests can be authenticated
    AuthStatus,
    /// Exchange LOCALLINE_USERNAME/LOCALLINE_PASSWORD for stored tokens
    AuthBootstrap,
    /// Create vendor picklists for a fulfillment week
    PicklistsCreate(PicklistArgs),
    /// Export orders for accounting
    OrdersExport(ExportArgs),
    /// Send an email to the operator's proof address only
    CustomersEmailProof(EmailArgs),
    /// Send an email to every active customer
    CustomersEmailSendAll(EmailArgs),
}

impl Commands {
    fn operation(&self) -> Operation {
        match self {
            Commands::AuthStatus => Operation::AuthStatus,
            Commands::AuthBootstrap => Operation::AuthBootstrap,
            Commands::PicklistsCreate(_) => Operation::PicklistsCreate,
            Commands::OrdersExport(_) => Operation::OrdersExport,
            Commands::CustomersEmailProof(_) => Operation::CustomersEmailProof,
            Commands::CustomersEmailSendAll(_) => Operation::CustomersEmailSendAll,
        }
    }
}

#[derive(Args)]
struct DateArgs {
    /// First fulfillment date (YYYY-MM-DD)
    #[arg(long)]
    start_date: String,

    /// Last fulfillment date (YYYY-MM-DD)
    #[arg(long)]
    end_date: String,
}

impl DateArgs {
    fn range(&self) -> Result<DateRange> {
        DateRange::parse(&self.start_date, &self.end_date)
    }
}

#[derive(Args)]
struct PicklistArgs {
    #[command(flatten)]
    dates: DateArgs,

    /// Batch name; defaults to e.g. "Thursday, Oct 22nd Deliveries"
    #[arg(long)]
    name: Option<String>,

    /// Note shown to vendors
    #[arg(long)]
    note: Option<String>,

    /// Allow a range other than the current Friday..Thursday week
    #[arg(long)]
    allow_outside_current_week: bool,
}

#[derive(Args)]
struct ExportArgs {
    #[command(flatten)]
    dates: DateArgs,

    /// Rendering of the records
    #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
    format: ExportFormat,

    /// Write the rendered export to this file instead of the envelope
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    Json,
    Csv,
}

#[derive(Args)]
struct EmailArgs {
    /// Subject line
    #[arg(long)]
    subject: String,

    /// HTML body
    #[arg(long)]
    body: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is fine; variables may come from the environment.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("localline=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let outcome = run(cli.command).await;

    match outcome.to_json() {
        Ok(json) => print!("{}", json),
        Err(e) => error!("Could not render result: {e}"),
    }
    ExitCode::from(u8::try_from(outcome.exit_code()).unwrap_or(1))
}

async fn run(command: Commands) -> Outcome {
    let operation = command.operation();
    let client = match Settings::from_env().and_then(LocalLineClient::with_keyring) {
        Ok(client) => client,
        Err(e) => return Outcome::failure(operation, &e),
    };
    info!(%operation, "running");

    match command {
        Commands::AuthStatus => Outcome::from_auth_status(&client.auth().status().await),
        Commands::AuthBootstrap => {
            Outcome::from_result(operation, &client.auth().bootstrap_from_env().await)
        }
        Commands::PicklistsCreate(args) => {
            Outcome::from_result(operation, &create_picklists(&client, &args).await)
        }
        Commands::OrdersExport(args) => {
            Outcome::from_result(operation, &export_orders(&client, &args).await)
        }
        Commands::CustomersEmailProof(args) => Outcome::from_result(
            operation,
            &client.customers().send_proof(&args.subject, &args.body).await,
        ),
        Commands::CustomersEmailSendAll(args) => {
            Outcome::from_broadcast(&client.customers().send_all(&args.subject, &args.body).await)
        }
    }
}

async fn create_picklists(
    client: &LocalLineClient,
    args: &PicklistArgs,
) -> Result<localline::models::PicklistCreated> {
    let range = args.dates.range()?;
    if !args.allow_outside_current_week {
        FulfillmentWeek::current(client.settings().timezone)?.check(&range)?;
    }

    let mut request = PicklistRequest::new(range);
    if let Some(name) = &args.name {
        request = request.with_name(name);
    }
    if let Some(note) = &args.note {
        request = request.with_note(note);
    }
    client.picklists().create(&request).await
}

async fn export_orders(client: &LocalLineClient, args: &ExportArgs) -> Result<serde_json::Value> {
    let range = args.dates.range()?;
    let export = client.orders().export(&range).await?;

    let rendered = match args.format {
        ExportFormat::Json => export.to_json()?,
        ExportFormat::Csv => export.to_csv()?,
    };

    match (&args.output, args.format) {
        (Some(path), format) => {
            std::fs::write(path, rendered).map_err(|e| {
                Error::Config(format!("cannot write {}: {}", path.display(), e))
            })?;
            Ok(json!({
                "output": path.display().to_string(),
                "format": format_name(format),
                "record_count": export.len(),
                "start_date": export.start_date,
                "end_date": export.end_date,
            }))
        }
        (None, ExportFormat::Json) => Ok(serde_json::to_value(&export)?),
        (None, ExportFormat::Csv) => Ok(json!({
            "format": "csv",
            "record_count": export.len(),
            "start_date": export.start_date,
            "end_date": export.end_date,
            "csv": rendered,
        })),
    }
}

fn format_name(format: ExportFormat) -> &'static str {
    match format {
        ExportFormat::Json => "json",
        ExportFormat::Csv => "csv",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_subcommands_match_operations() {
        let cmd = Cli::command();
        let names: Vec<&str> = cmd.get_subcommands().map(|c| c.get_name()).collect();
        let expected: Vec<&str> = Operation::ALL.iter().map(|op| op.command_name()).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_parse_picklists_create() {
        let cli = Cli::try_parse_from([
            "localline",
            "picklists-create",
            "--start-date",
            "2026-10-16",
            "--end-date",
            "2026-10-22",
            "--allow-outside-current-week",
        ])
        .unwrap();
        let Commands::PicklistsCreate(args) = cli.command else {
            panic!("expected picklists-create");
        };
        assert!(args.allow_outside_current_week);
        assert!(args.name.is_none());
        assert_eq!(args.dates.range().unwrap().days(), 7);
    }

    #[test]
    fn test_reversed_dates_are_validation_errors() {
        let args = DateArgs {
            start_date: "2026-10-22".into(),
            end_date: "2026-10-16".into(),
        };
        let err = args.range().unwrap_err();
        let outcome = Outcome::failure(Operation::OrdersExport, &err);
        assert_eq!(outcome.exit_code(), 2);
    }
}
