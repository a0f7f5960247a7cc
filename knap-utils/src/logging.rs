use anyhow::{anyhow, Result};
use log::LevelFilter;
use once_cell::sync::Lazy;
use std::time::Instant;

pub static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Installs the process-wide logger: `[LEVEL] [hh:mm:ss] <thread> message` on stderr.
pub fn init_logger(level_filter: LevelFilter) -> Result<()> {
    Lazy::force(&EPOCH);
    fern::Dispatch::new()
        .format(|out, message, record| {
            let handle = std::thread::current();
            let thread_name = handle.name().unwrap_or("-");

            let elapsed = EPOCH.elapsed().as_secs();
            let prefix = format!(
                "[{}] [{:0>2}:{:0>2}:{:0>2}] <{}>",
                record.level(),
                elapsed / 3600,
                (elapsed / 60) % 60,
                elapsed % 60,
                thread_name,
            );
            out.finish(format_args!("{:<32}{}", prefix, message))
        })
        .level(level_filter)
        .chain(std::io::stderr())
        .apply()
        .map_err(|e| anyhow!("could not initialize logger: {}", e))
}
