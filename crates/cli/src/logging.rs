use signoff_engine::config::LoggingSettings;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable that overrides the configured log filter.
pub(crate) const LOG_ENV: &str = "SIGNOFF_LOG";

/// Install the global subscriber. Logs go to stderr so stdout stays
/// machine-readable.
pub(crate) fn init(settings: &LoggingSettings) -> Result<(), String> {
    let filter = match EnvFilter::try_from_env(LOG_ENV) {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&settings.level)
            .map_err(|e| format!("invalid log level '{}': {}", settings.level, e))?,
    };

    let json = settings.json.then(|| {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(std::io::stderr)
    });
    let text = (!settings.json).then(|| fmt::layer().with_target(false).with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(text)
        .try_init()
        .map_err(|e| format!("could not install logger: {}", e))
}
