use std::path::PathBuf;
use std::sync::Arc;

use eyre::{Result, WrapErr};
use ficha_forms::WizardDefinition;
use ficha_replay::config::ReplayConfig;
use ficha_replay::replay;
use ficha_replay::session::Session;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = ReplayConfig::load(config_path.as_deref())?;
    init_tracing(config.log_json);

    let definition = WizardDefinition::load(&config.definition)
        .wrap_err_with(|| format!("loading definition {}", config.definition.display()))?;
    let session = Session::load(&config.session)?;

    let report = replay::run(Arc::new(definition), session, config.debounce()).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Logs go to stderr so the report on stdout stays machine-readable.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
