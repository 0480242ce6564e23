use std::path::Path;

use gesturelink::{
    AppResult,
    cli::{Cli, Commands},
    config::Config,
    gesture::MockGestureBackend,
    init_logging,
    session::SessionManager,
    ui,
};

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse_args();

    let command = cli.command();

    // Load configuration, reporting a failure once logging is up
    let (mut config, config_error) = match Config::load_from_file(&cli.config_file) {
        Ok(config) => (config, None),
        Err(e) => (Config::fallback(), Some(e)),
    };

    // Initialize logging; keep the interactive console free of info lines
    let quiet_stderr =
        matches!(command, Commands::Console { .. }) && cli.log_level.is_none() && !cli.verbose;
    let _log_guard = init_logging(
        &cli.effective_log_level(&config.log_level),
        &config.log,
        quiet_stderr,
    )?;

    if let Some(e) = config_error {
        if Path::new(&cli.config_file).exists() {
            tracing::warn!("Failed to load config: {:#}, using defaults", e);
        } else {
            tracing::debug!("No config file at {}, using defaults", cli.config_file);
        }
    }

    tracing::info!("GestureLink starting...");
    tracing::debug!("CLI arguments: {:?}", cli);

    match command {
        Commands::Console { autostart } => {
            if let Some(endpoint) = &cli.endpoint {
                config.set_value("backend.endpoint", endpoint)?;
            }
            ui::display_welcome(&config);

            let mut session_manager = SessionManager::from_config(&config);
            let handle = session_manager.handle();
            let options = ui::console::ConsoleOptions {
                enable_colors: config.ui.enable_colors,
                autostart,
            };

            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let interrupt = async {
                let _ = tokio::signal::ctrl_c().await;
            };
            let console = tokio::spawn(ui::console::run_console(handle, stdin, options, interrupt));

            // Returns once the console requests shutdown; the channel is torn down on exit
            session_manager.run().await?;
            console.await??;

            ui::display_session_summary(session_manager.get_stats(), &session_manager.snapshot());
        }
        Commands::MockBackend { bind } => {
            if let Some(bind) = bind {
                config.set_value("mock.bind_addr", &bind)?;
            }
            let backend = MockGestureBackend::from_config(&config.mock).await?;
            println!("Mock gesture backend listening on {}", backend.endpoint()?);
            backend
                .serve(async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await?;
        }
        Commands::Config { action } => {
            Config::handle_command(&action, &config, &cli.config_file)?;
        }
    }

    Ok(())
}
