use std::fs::{create_dir_all, write};
use std::path::{Path, PathBuf};
use tracing::{error, info};
use crate::config::OutputConfig;
use crate::error::{CodeGenerationError, IonChannelError};
use crate::registry::ChannelRegistry;
use super::cpp::{
    HEADER_FILE_NAME, SOURCE_FILE_NAME, channel_creator, generate_cpp_channel, header_preamble, source_preamble,
};
use super::nmodl::{ModFile, generate_mod_file};


/// Every artifact of a registry, held in memory until written
#[derive(Debug)]
pub struct BatchOutput {
    pub mod_files: Vec<ModFile>,
    pub header: String,
    pub source: String,
    /// Channels present in both artifacts, in registry order
    pub channels: Vec<String>,
    /// Channels that failed, they appear in no artifact
    pub failures: Vec<(String, IonChannelError)>,
}

/// Paths written by [`compile_registry`]
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub written: Vec<PathBuf>,
    pub channels: Vec<String>,
    pub failures: Vec<String>,
}

/// Generates both backends for every channel in registry order.
///
/// A channel is either generated completely or not at all, so a failing
/// channel leaves no partial class or factory entry behind.
pub fn generate_registry(registry: &ChannelRegistry, conductance: f64) -> BatchOutput {
    let mut header = header_preamble();
    let mut source = source_preamble();
    let mut mod_files = vec![];
    let mut channels = vec![];
    let mut failures = vec![];

    for definition in registry.iter() {
        let generated = definition.build()
            .map_err(IonChannelError::from)
            .and_then(|model| {
                let mod_file = generate_mod_file(&model, conductance)?;
                let cpp = generate_cpp_channel(&model)?;

                Ok((mod_file, cpp))
            });

        match generated {
            Ok((mod_file, cpp)) => {
                header.push_str(&cpp.declaration);
                header.push('\n');
                source.push_str(&cpp.definitions);
                source.push('\n');
                mod_files.push(mod_file);
                channels.push(definition.name.clone());
            },
            Err(e) => failures.push((definition.name.clone(), e)),
        }
    }

    header.push_str(&channel_creator(&channels));

    BatchOutput { mod_files, header, source, channels, failures }
}

fn write_file(path: &Path, text: &str) -> Result<(), CodeGenerationError> {
    write(path, text)
        .map_err(|e| CodeGenerationError::WriteFailure(format!("{}: {}", path.display(), e)))
}

fn create_directory(path: &Path) -> Result<(), CodeGenerationError> {
    create_dir_all(path)
        .map_err(|e| CodeGenerationError::WriteFailure(format!("{}: {}", path.display(), e)))
}

/// Generates every channel of `registry` and writes the mechanisms and the
/// C++ sources in one pass, failing channels are logged and skipped
pub fn compile_registry(registry: &ChannelRegistry, output: &OutputConfig) -> Result<BatchReport, IonChannelError> {
    let generated = generate_registry(registry, output.conductance);

    for (name, e) in generated.failures.iter() {
        error!(channel = name.as_str(), error = %e, "channel skipped");
    }

    create_directory(&output.mod_directory)?;
    create_directory(&output.cpp_directory)?;

    let mut written = vec![];
    for mod_file in generated.mod_files.iter() {
        let path = output.mod_directory.join(&mod_file.file_name);
        write_file(&path, &mod_file.text)?;
        info!(path = %path.display(), "wrote mechanism");
        written.push(path);
    }

    let header = output.cpp_directory.join(HEADER_FILE_NAME);
    let source = output.cpp_directory.join(SOURCE_FILE_NAME);
    write_file(&header, &generated.header)?;
    write_file(&source, &generated.source)?;
    info!(header = %header.display(), source = %source.display(), channels = generated.channels.len(), "wrote C++ channels");
    written.push(header);
    written.push(source);

    Ok(BatchReport {
        written,
        channels: generated.channels,
        failures: generated.failures.into_iter().map(|(name, _)| name).collect(),
    })
}
