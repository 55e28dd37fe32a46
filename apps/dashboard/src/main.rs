use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use scan_client::{
    connectivity::{spawn_status_probe, Connectivity, ConnectivityWatcher},
    display::dashboard_view,
    http::build_http_client,
    lookup::{BackendProductLookup, OpenFoodFactsLookup},
    preferences::{
        default_preferences_path, preferences_path_in, FilePreferenceStore, ThemePreference,
    },
    store::HttpScanStore,
    ExportFormat, ProductLookup, ScanController, SubmitOutcome,
};
use shared::domain::Theme;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod render;

use config::{load_settings, LookupSource, Settings};
use render::render_dashboard;

#[derive(Parser, Debug)]
#[command(name = "nutrition-dashboard", about = "Barcode nutrition tracker dashboard")]
struct Cli {
    /// Settings file; defaults to ./dashboard.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    backend_url: Option<String>,
    #[arg(long, global = true)]
    product_db_url: Option<String>,
    #[arg(long, global = true, value_enum)]
    lookup_source: Option<LookupSource>,
    /// Where display preferences are kept.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Look up a barcode, record it and print the updated dashboard.
    Scan { barcode: String },
    /// Print today's totals and the scan history.
    Show,
    /// Write the scan history to a file.
    Export {
        #[arg(long, default_value = "csv")]
        format: ExportFormat,
        /// Target directory; defaults to the configured export dir.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the theme, or set it when a value is given.
    Theme { value: Option<Theme> },
    /// Interactive session reading barcodes from stdin.
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = apply_cli_overrides(load_settings(cli.config.as_deref()), &cli);
    info!(
        backend = %settings.backend_url,
        lookup = ?settings.lookup_source,
        "starting nutrition dashboard"
    );

    let (controller, store) = build_controller(&settings)?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Scan { barcode } => {
            let _ = controller.refresh().await;
            let result = controller.submit_scan(&barcode).await;
            print_dashboard(&controller).await;
            match result? {
                SubmitOutcome::Saved {
                    scan_id: Some(scan_id),
                    name,
                } => println!("Saved scan #{scan_id}: {name}"),
                SubmitOutcome::Saved { scan_id: None, name } => println!("Saved scan: {name}"),
                SubmitOutcome::Ignored(reason) => bail!("barcode not submitted: {reason:?}"),
            }
        }
        Command::Show => {
            let result = controller.refresh().await;
            print_dashboard(&controller).await;
            result?;
        }
        Command::Export { format, out } => {
            if let Err(err) = controller.refresh().await {
                warn!(error = %err, "exporting whatever history is already loaded");
            }
            let dir = out.unwrap_or_else(|| settings.export_dir.clone());
            let path = controller.export_history_to(&dir, format).await?;
            println!("{}", path.display());
        }
        Command::Theme { value } => {
            let theme = match value {
                Some(theme) => {
                    controller.set_theme(theme).await?;
                    theme
                }
                None => controller.theme().await,
            };
            println!("{theme}");
        }
        Command::Run => run_session(controller, store, &settings).await?,
    }
    Ok(())
}

fn apply_cli_overrides(mut settings: Settings, cli: &Cli) -> Settings {
    if let Some(url) = &cli.backend_url {
        settings.backend_url = url.clone();
    }
    if let Some(url) = &cli.product_db_url {
        settings.product_db_url = url.clone();
    }
    if let Some(source) = cli.lookup_source {
        settings.lookup_source = source;
    }
    if let Some(dir) = &cli.data_dir {
        settings.data_dir = Some(dir.clone());
    }
    settings
}

fn build_controller(settings: &Settings) -> Result<(Arc<ScanController>, Arc<HttpScanStore>)> {
    let http = build_http_client(settings.request_timeout)?;
    let store = Arc::new(
        HttpScanStore::new(http.clone(), &settings.backend_url)
            .context("invalid backend url")?,
    );
    let lookup: Arc<dyn ProductLookup> = match settings.lookup_source {
        LookupSource::Openfoodfacts => Arc::new(
            OpenFoodFactsLookup::new(http, &settings.product_db_url)
                .context("invalid product database url")?,
        ),
        LookupSource::Backend => Arc::new(
            BackendProductLookup::new(http, &settings.backend_url)
                .context("invalid backend url")?,
        ),
    };

    let prefs_path = match &settings.data_dir {
        Some(dir) => preferences_path_in(dir),
        None => default_preferences_path()?,
    };
    let theme = ThemePreference::load(Arc::new(FilePreferenceStore::new(prefs_path)));

    let controller = ScanController::new(
        lookup,
        store.clone(),
        ConnectivityWatcher::new(Connectivity::Online),
        theme,
    );
    Ok((controller, store))
}

async fn print_dashboard(controller: &ScanController) {
    let state = controller.snapshot().await;
    println!("{}", render_dashboard(&dashboard_view(&state)));
}

async fn run_session(
    controller: Arc<ScanController>,
    store: Arc<HttpScanStore>,
    settings: &Settings,
) -> Result<()> {
    let probe = spawn_status_probe(
        controller.connectivity().clone(),
        store,
        settings.status_probe_interval,
    );
    let mut connectivity = controller.connectivity().subscribe();

    let _ = controller.refresh().await;
    print_dashboard(&controller).await;
    println!("Scan or type a barcode. Commands: :theme, :export csv|json, :refresh, :quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                if !handle_line(&controller, line.trim(), settings).await {
                    break;
                }
            }
            changed = connectivity.changed() => {
                if changed.is_err() {
                    continue;
                }
                let now = *connectivity.borrow_and_update();
                println!("[{}]", if now.is_online() { "Online" } else { "Offline" });
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    probe.abort();
    Ok(())
}

/// Returns false when the session should end.
async fn handle_line(controller: &ScanController, line: &str, settings: &Settings) -> bool {
    match line {
        ":quit" | ":q" => return false,
        ":theme" => match controller.toggle_theme().await {
            Ok(theme) => println!("Theme: {theme}"),
            Err(err) => println!("! {err:#}"),
        },
        ":refresh" => {
            let _ = controller.refresh().await;
            print_dashboard(controller).await;
        }
        _ if line.starts_with(":export") => {
            let format = line.trim_start_matches(":export").trim();
            let format = if format.is_empty() { "csv" } else { format };
            match format.parse::<ExportFormat>() {
                Ok(format) => {
                    match controller
                        .export_history_to(&settings.export_dir, format)
                        .await
                    {
                        Ok(path) => println!("Exported {}", path.display()),
                        Err(err) => println!("! {err:#}"),
                    }
                }
                Err(err) => println!("! {err}"),
            }
        }
        barcode => {
            controller.set_barcode_input(barcode).await;
            if let Ok(SubmitOutcome::Saved { name, .. }) = controller.submit_current().await {
                println!("Saved: {name}");
            }
            print_dashboard(controller).await;
        }
    }
    true
}
