//! Command line front end: parses arguments, wires logging, configuration
//! and the transport, then hands the command to [`app::App`].
mod app;
mod cli;
mod config;
mod persistence;
mod render;

use anyhow::Result;
use clap::Parser;
use facetrain_logging::{ft_info, LogDestination};
use log::LevelFilter;

use app::App;
use cli::Cli;
use config::ClientConfig;
use persistence::Store;

pub(crate) async fn run() -> Result<()> {
    let cli = Cli::parse();

    let (destination, level) = if cli.verbose {
        (LogDestination::Both, LevelFilter::Debug)
    } else {
        (LogDestination::File, LevelFilter::Info)
    };
    facetrain_logging::initialize(destination, level, cli.log_file.as_deref());

    let mut config = ClientConfig::resolve(&cli)?;
    let store = Store::new(config.data_dir.clone(), config.history_capacity)
        .with_max_bytes(config.history_max_bytes);
    let session = store.load_session();
    if cli.domain.is_none() {
        if let Some(domain) = session.as_ref().and_then(|session| session.domain.clone()) {
            config.default_domain = domain;
        }
    }
    let transport = config.build_transport(session.map(|session| session.token))?;
    ft_info!(
        "facetrain {} starting: {:?} backend at {}, domain {}",
        env!("CARGO_PKG_VERSION"),
        config.backend,
        config.api_base_url,
        config.default_domain
    );

    App::new(config, store, transport).run(cli.command).await
}
