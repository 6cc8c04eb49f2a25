use std::path::Path;

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter};

/// Log to the console and, optionally, to a file. `RUST_LOG` picks the
/// level; without it only warnings and errors are shown.
pub fn init(path: Option<&Path>) -> Result<()> {
    let file_layer = if let Some(path) = path {
        let file = std::fs::File::create(path)?;
        Some(
            fmt::layer()
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true),
        )
    } else {
        None
    };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(!cfg!(windows))
        .with_target(true);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let collector = tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .with(filter);
    tracing::subscriber::set_global_default(collector)?;

    if let Some(path) = path {
        tracing::debug!("Logging initiated to file \"{}\"", path.display());
    }
    Ok(())
}
