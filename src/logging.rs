use tracing_subscriber::EnvFilter;

/// Logs go to stderr so `ytgrab get` output stays clean on stdout.
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,ytgrab=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}
