use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ember_auth::UserStore;
use ember_rpc::transport::{TcpLineTransport, Transport, WebSocketTransport};
use ember_rules::RuleStore;
use ember_server::cli::{Args, Command, RulesCommand, UserCommand};
use ember_server::config::{apply_env_overrides, StartupConfig};

fn main() -> Result<()> {
    let args = Args::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build().context("failed to start the tokio runtime")?;
    runtime.block_on(run(args))
}

async fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Serve { tcp_bind, ws_bind } => {
            let startup =
                apply_env_overrides(StartupConfig { data_dir: args.data_dir, tcp_bind, ws_bind, log_json: args.log_json });
            ember_server::logging::init(startup.log_json);
            serve(startup).await
        }
        Command::User { command } => {
            ember_server::logging::init(args.log_json);
            run_user_command(&args.data_dir, command)
        }
        Command::Rules { command } => {
            ember_server::logging::init(args.log_json);
            run_rules_command(&args.data_dir, command)
        }
    }
}

async fn serve(startup: StartupConfig) -> Result<()> {
    tracing::info!(data_dir = %startup.data_dir.display(), tcp_bind = %startup.tcp_bind, ws_bind = %startup.ws_bind, "starting ember");

    let mut log = ember_server::startup::StartupLogger::new();
    log.banner();
    log.phase_init();
    log.info(&format!("data dir: {}", startup.data_dir.display()));

    let mut core = ember_server::bootstrap(&startup)?;
    core.spawn_outbound_pump();
    let (_device_events, event_driver_task) = core.spawn_event_driver();
    let time_driver_task = core.spawn_time_driver(std::time::Duration::from_secs(1));
    log.success("storage, rule engine, and user store ready");

    log.phase_services();
    let tcp = Arc::new(TcpLineTransport::new(startup.tcp_bind, true));
    let ws = Arc::new(WebSocketTransport::new(startup.ws_bind, true, core.introspection.clone()));

    let tcp_task = tokio::spawn({
        let rpc = core.rpc.clone();
        let multiplexer = core.multiplexer.clone();
        let tcp = tcp.clone();
        async move {
            if let Err(e) = tcp.open(rpc, multiplexer).await {
                tracing::error!(error = %e, "TCP transport exited");
            }
        }
    });
    let ws_task = tokio::spawn({
        let rpc = core.rpc.clone();
        let multiplexer = core.multiplexer.clone();
        let ws = ws.clone();
        async move {
            if let Err(e) = ws.open(rpc, multiplexer).await {
                tracing::error!(error = %e, "WebSocket transport exited");
            }
        }
    });

    log.success("tcp transport listening");
    log.success("websocket transport listening");
    log.phase_ready();
    log.ready_info(&startup.tcp_bind.to_string(), &startup.ws_bind.to_string());

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    tracing::info!("shutting down");
    tcp.close().await;
    ws.close().await;
    tcp_task.abort();
    ws_task.abort();
    event_driver_task.abort();
    time_driver_task.abort();
    Ok(())
}

fn run_user_command(data_dir: &std::path::Path, command: UserCommand) -> Result<()> {
    let backend = open_backend(data_dir)?;
    let users = UserStore::new(backend);
    match command {
        UserCommand::Create { username, password } => {
            users.create_user(&username, &password)?;
            println!("created user {username}");
        }
        UserCommand::List => {
            for record in users.list_users()? {
                println!("{}", record.username);
            }
        }
        UserCommand::Remove { username } => {
            users.remove_user(&username)?;
            println!("removed user {username}");
        }
    }
    Ok(())
}

fn run_rules_command(data_dir: &std::path::Path, command: RulesCommand) -> Result<()> {
    let backend = open_backend(data_dir)?;
    let store = RuleStore::new(backend);
    match command {
        RulesCommand::List => {
            for rule in store.load_all()? {
                println!("{} {}", rule.id, rule.name);
            }
        }
        RulesCommand::Export { path } => {
            let export = store.export()?;
            std::fs::write(&path, serde_json::to_string_pretty(&export)?)?;
            println!("exported to {}", path.display());
        }
        RulesCommand::Import { path } => {
            let raw = std::fs::read_to_string(&path)?;
            let export = serde_json::from_str(&raw)?;
            store.import_raw(export)?;
            println!("imported from {}", path.display());
        }
    }
    Ok(())
}

fn open_backend(data_dir: &std::path::Path) -> Result<Arc<dyn ember_storage::KeyValueStore>> {
    std::fs::create_dir_all(data_dir)?;
    let path = data_dir.join("ember.db");
    Ok(Arc::new(ember_storage::RedbStore::open(path.display().to_string())?))
}
