//! Staker dashboard daemon: entry point for watching a staking contract.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::Parser;
use staker_chain::{JsonRpcClient, StakerContract};
use staker_dashboard::{
    read_status_once, DashboardConfig, DashboardController, DashboardMetrics, DashboardSettings,
    ShutdownController,
};
use staker_server::DashboardServer;
use staker_types::EthAddress;
use staker_utils::LogFormat;

#[derive(Parser)]
#[command(name = "staker-dashboard", about = "Live dashboard for a staking contract")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "STAKER_CONFIG")]
    config: Option<PathBuf>,

    /// JSON-RPC endpoint of the ledger node.
    #[arg(long, env = "STAKER_RPC_URL")]
    rpc_url: Option<String>,

    /// Address of the staking contract.
    #[arg(long, env = "STAKER_ADDRESS")]
    staker: Option<EthAddress>,

    /// Address of the external contract (read from the staker when omitted).
    #[arg(long, env = "STAKER_EXTERNAL_ADDRESS")]
    external: Option<EthAddress>,

    /// Node-managed account used as caller and transaction sender.
    #[arg(long, env = "STAKER_ACCOUNT")]
    account: Option<EthAddress>,

    /// HTTP port for the browser dashboard.
    #[arg(long, env = "STAKER_HTTP_PORT")]
    port: Option<u16>,

    /// Do not serve the browser dashboard.
    #[arg(long, env = "STAKER_NO_HTTP")]
    no_http: bool,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "STAKER_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "STAKER_LOG_FORMAT")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the dashboard until interrupted.
    Run,
    /// Read every contract value once and print it as JSON.
    Status,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<DashboardConfig> {
        let mut config = match &self.config {
            Some(path) => DashboardConfig::from_toml_file(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => DashboardConfig::default(),
        };
        if let Some(rpc_url) = &self.rpc_url {
            config.rpc_url = rpc_url.clone();
        }
        if self.staker.is_some() {
            config.staker_address = self.staker;
        }
        if self.external.is_some() {
            config.external_address = self.external;
        }
        if self.account.is_some() {
            config.account = self.account;
        }
        if let Some(port) = self.port {
            config.http_port = port;
        }
        if self.no_http {
            config.enable_http = false;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.log_format = format.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    let format: LogFormat = config.log_format.parse()?;
    staker_utils::init_logging(format, &config.log_level);

    let mut client = JsonRpcClient::new(&config.rpc_url);
    if let Some(account) = config.account {
        client = client.with_account(account);
    }
    let staker = config
        .staker_address
        .ok_or_else(|| anyhow!("staker_address is not set"))?;
    let contract = match config.external_address {
        Some(external) => StakerContract::new(staker, external),
        None => StakerContract::resolve(&client, staker)
            .await
            .context("failed to read the external contract address")?,
    };

    match cli.command {
        Command::Status => {
            let report =
                read_status_once(&client, contract, config.account, config.event_start()).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Run => run(config, client, contract).await?,
    }

    Ok(())
}

async fn run(
    config: DashboardConfig,
    client: JsonRpcClient,
    contract: StakerContract,
) -> anyhow::Result<()> {
    let http = if config.enable_http {
        config.http_port.to_string()
    } else {
        "off".to_string()
    };
    tracing::info!(
        rpc = %config.rpc_url,
        staker = %contract.address,
        external = %contract.external,
        account = ?config.account,
        %http,
        "starting staker dashboard"
    );

    let metrics = Arc::new(DashboardMetrics::new()?);
    let settings = DashboardSettings::from_config(&config, contract);
    let (controller, handle) = DashboardController::new(Arc::new(client), settings, metrics.clone());

    let shutdown = ShutdownController::new();
    let controller_task = tokio::spawn(controller.run(shutdown.clone()));

    let mut server_task = config.enable_http.then(|| {
        let server = DashboardServer::new(config.http_port, handle, metrics);
        let rx = shutdown.subscribe();
        tokio::spawn(async move { server.start(rx).await })
    });

    let server_exit = async {
        match server_task.as_mut() {
            Some(task) => task.await,
            None => std::future::pending().await,
        }
    };

    let server_failed = tokio::select! {
        _ = shutdown.wait_for_signal() => false,
        result = server_exit => {
            match result {
                Ok(Ok(())) => tracing::warn!("dashboard server exited"),
                Ok(Err(e)) => tracing::error!(error = %e, "dashboard server failed"),
                Err(e) => tracing::error!(error = %e, "dashboard server task panicked"),
            }
            true
        }
    };

    if server_failed {
        shutdown.shutdown();
    } else if let Some(task) = server_task {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "dashboard server exited with error"),
            Err(e) => tracing::warn!(error = %e, "dashboard server task join error"),
        }
    }
    controller_task.await.context("controller task failed")?;

    tracing::info!("staker dashboard exited cleanly");
    Ok(())
}
