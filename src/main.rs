use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays machine-readable JSON.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("handover=info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    handover::run()?;
    Ok(())
}
