use donasiin_server::{backend, server};
mod cli;

use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

fn check_config(path: Option<std::path::PathBuf>) -> Result<(), server::config::ConfigError> {
    let config = match path {
        Some(p) => server::AppConfig::load_from_path(p)?,
        None => server::AppConfig::load()?,
    };
    println!("config OK");
    println!("  backend:       {}", config.backend_kind());
    println!("  timezone:      {}", config.timezone);
    println!("  merchant:      {}", config.merchant.name);
    println!("  min donation:  Rp {}", config.min_donation);
    println!("  admin emails:  {}", config.admin_emails.len());
    println!("  local users:   {}", config.users.len());
    Ok(())
}

#[tokio::main]
async fn main() {
    use clap::Parser;
    let args = cli::Cli::parse();
    if let Some(cmd) = args.command {
        match cmd {
            cli::Command::CheckConfig { path } => {
                if let Err(e) = check_config(path) {
                    eprintln!("Config error: {}", e);
                    std::process::exit(2);
                }
            }
            cli::Command::HashPassword { password, cost } => match bcrypt::hash(&password, cost) {
                Ok(hash) => println!("{hash}"),
                Err(e) => {
                    eprintln!("Hash error: {}", e);
                    std::process::exit(2);
                }
            },
        }
        return;
    }
    // Console-only logging with env-driven level
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_ansi(true)
        .init();

    let config = match server::AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error=%e, "Failed to load config");
            std::process::exit(2);
        }
    };

    let backend = match backend::connect(&config).await {
        Ok(b) => b,
        Err(e) => {
            tracing::error!(error=%e, kind = config.backend_kind(), "Failed to connect backend");
            std::process::exit(3);
        }
    };

    // Decide listen port: env PORT overrides config.listen_port, default 5151
    let port = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .or(config.listen_port)
        .unwrap_or(5151);

    let state = server::AppState::new(config, backend);
    let shutdown_token = state.shutdown_token();
    let shutdown_token_for_server = shutdown_token.clone();

    let audit = tokio::spawn(server::session::audit_sessions(
        state.sessions.subscribe(),
        shutdown_token.clone(),
    ));

    let app = server::router(state);

    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("bind listener");

    let mut server_task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_token_for_server.cancelled_owned())
            .await
    });

    // Wait for OS signal; then trigger graceful, and if it hangs beyond timeout, force abort.
    shutdown_signal().await;
    tracing::info!("shutdown: initiating graceful stop");
    shutdown_token.cancel();
    match tokio::time::timeout(std::time::Duration::from_secs(3), &mut server_task).await {
        Ok(join_res) => match join_res {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::error!(%err, "server error"),
            Err(e) => tracing::error!(error=%e, "server task join error"),
        },
        Err(_) => {
            tracing::warn!("shutdown: forcing server abort due to timeout");
            server_task.abort();
        }
    }
    if let Err(e) = audit.await {
        tracing::error!(error=%e, "session audit task join error");
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigint = signal(SignalKind::interrupt()).expect("listen SIGINT");
        let mut sigterm = signal(SignalKind::terminate()).expect("listen SIGTERM");
        tokio::select! {
            _ = sigint.recv() => {
                tracing::info!("shutdown: received SIGINT");
            }
            _ = sigterm.recv() => {
                tracing::info!("shutdown: received SIGTERM");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown: received Ctrl+C");
    }
}
