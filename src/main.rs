use std::{
    env,
    io::{Error, ErrorKind, Result},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use ion_channel_compiler::{codegen::compile_registry, config::CompilerConfig};


fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("Requires .toml argument file");
        return Err(Error::new(ErrorKind::InvalidInput, "Requires .toml argument file"));
    }

    let config = CompilerConfig::from_file(&args[1])
        .map_err(|e| Error::new(ErrorKind::InvalidData, e.to_string()))?;
    let registry = config.registry()
        .map_err(|e| Error::new(ErrorKind::InvalidInput, e.to_string()))?;

    info!(channels = registry.len(), "compiling channel registry");

    let report = compile_registry(&registry, &config.output)
        .map_err(|e| Error::new(ErrorKind::Other, e.to_string()))?;

    if !report.failures.is_empty() {
        warn!(failed = ?report.failures, "some channels were not generated");
    }
    info!(files = report.written.len(), channels = report.channels.len(), "done");

    Ok(())
}
