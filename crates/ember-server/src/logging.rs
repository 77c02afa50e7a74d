//! Structured logging setup, grounded in the teacher's `tracing_subscriber`
//! bootstrap (`neomind-cli::main`): an `EnvFilter` that defaults to
//! `info`/`warn` when `RUST_LOG` isn't set, with an optional JSON formatter
//! for container/production environments.

pub fn init(json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("ember=info,ember_rpc=info,ember_rules=info"));

    if json {
        tracing_subscriber::fmt().json().with_env_filter(env_filter).with_target(true).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).with_target(false).compact().init();
    }
}
