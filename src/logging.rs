use crate::config::Environment;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset. sqlx statement logging stays at
/// warn; lifecycle events from this crate carry the useful detail.
fn default_directives(env: &Environment) -> &'static str {
    match env {
        Environment::Dev => "rfq_backend=debug,tower_http=debug,sqlx=warn,info",
        Environment::Staging => "rfq_backend=debug,tower_http=info,sqlx=warn,info",
        Environment::Prod => "rfq_backend=info,tower_http=info,sqlx=warn,warn",
    }
}

pub fn init_logging(env: &Environment) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(env)));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(env.is_dev())
        .with_line_number(env.is_dev());

    // Prod ships JSON lines with the current HTTP span (method, uri, request_id)
    if env.is_prod() {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json().with_current_span(true).with_span_list(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.pretty())
            .init();
    }

    tracing::info!(env = ?env, "Logging initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directives_parse() {
        for env in [Environment::Dev, Environment::Staging, Environment::Prod] {
            let directives = default_directives(&env);
            assert!(directives.starts_with("rfq_backend="));
            assert!(EnvFilter::try_new(directives).is_ok());
        }
    }
}
