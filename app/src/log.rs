/// Installs the global logger.
///
/// Logs go to stderr. The level is Debug in development builds and Info in
/// production builds; `RUST_LOG` overrides both. Calling this more than once
/// is harmless, only the first call installs a logger.
pub fn init() {
    let _ = builder().try_init();
}

fn builder() -> env_logger::Builder {
    let default_level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(default_level)
        // Keep the HTTP stack quiet unless asked for explicitly
        .filter_module("hyper", log::LevelFilter::Info)
        .filter_module("reqwest", log::LevelFilter::Info)
        .parse_default_env();
    builder
}
