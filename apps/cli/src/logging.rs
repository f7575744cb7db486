use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info";

fn create_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|err| {
        if let Ok(var) = std::env::var(EnvFilter::DEFAULT_ENV) {
            eprintln!("Failed to parse {} environment variable '{var}': {err}", EnvFilter::DEFAULT_ENV);
        }
        EnvFilter::new(DEFAULT_LOG_FILTER)
    })
}

/// Installs the global subscriber. Log lines go to stderr so stdout stays parseable.
pub fn init_tracing() -> anyhow::Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(create_env_filter())
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
