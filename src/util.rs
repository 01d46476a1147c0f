use tracing::warn;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub fn setup_logging(log_level: &str) {
    let level: Option<Directive> = log_level.parse().ok();

    let mut filter = EnvFilter::from_default_env()
        .add_directive("hyper=info".parse().expect("static directive"))
        .add_directive("reqwest=info".parse().expect("static directive"));
    if let Some(directive) = level.clone() {
        filter = filter.add_directive(directive);
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .pretty(),
        )
        .with(filter)
        .try_init()
        .expect("Failed to initialize logging");

    if level.is_none() {
        warn!("Ignoring invalid log level {:?}", log_level);
    }
}
