//! Logging setup for the demo binaries

pub use log::{debug, error, info, trace, warn, LevelFilter};

/// Install `env_logger` at `level`; `RUST_LOG` directives take precedence
///
/// A second call is a no-op.
pub fn init(level: LevelFilter) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    builder.parse_env(env_logger::Env::default());
    if builder.try_init().is_ok() {
        log::debug!("Logger initialized at {}", level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init(LevelFilter::Warn);
        init(LevelFilter::Debug);
        warn!("logging still works after a repeated init");
    }
}
