//! Tracing subscriber setup shared by the service binaries.

use anyhow::Result;
use once_cell::sync::OnceCell;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static TRACING_INIT: OnceCell<()> = OnceCell::new();

/// Install the global subscriber. `RUST_LOG` wins over `log_level`; later calls are no-ops.
pub fn init_tracing(service: &str, log_level: &str, json: bool) -> Result<()> {
    TRACING_INIT.get_or_try_init(|| -> Result<()> {
        let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(log_level))?;
        let registry = tracing_subscriber::registry().with(env_filter);
        if json {
            registry
                .with(fmt::layer().json().flatten_event(true).with_current_span(true).with_span_list(false))
                .try_init()?;
        } else {
            registry
                .with(fmt::layer().with_target(true).with_thread_ids(false).with_line_number(true))
                .try_init()?;
        }
        Ok(())
    })?;
    info!(service, json, "tracing_initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_a_no_op() {
        init_tracing("trainer-core-test", "debug", false).unwrap();
        init_tracing("trainer-core-test", "debug", true).unwrap();
    }
}
