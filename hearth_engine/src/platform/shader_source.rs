/// Shader bytecode loading.
///
/// The render context never parses shader source: it receives pre-compiled
/// SPIR-V as bytes. Where those bytes come from (files, packed archives,
/// `include_bytes!`) is up to the implementor of [`ShaderSource`].

use std::path::{Path, PathBuf};
use crate::error::{Error, Result};
use crate::engine_debug;

/// Supplies compiled shader bytecode by name
pub trait ShaderSource {
    /// Load the bytecode registered under `name`
    ///
    /// # Errors
    ///
    /// `InvalidResource` if the bytecode cannot be found or read.
    fn load(&self, name: &str) -> Result<Vec<u8>>;
}

/// Loads bytecode from files under a root directory
#[derive(Debug, Clone)]
pub struct FileShaderSource {
    root: PathBuf,
}

impl FileShaderSource {
    /// Create a source reading files relative to `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ShaderSource for FileShaderSource {
    fn load(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.root.join(name);
        let bytes = std::fs::read(&path).map_err(|e| {
            Error::InvalidResource(format!("cannot read shader '{}': {}", path.display(), e))
        })?;
        engine_debug!("hearth::ShaderSource", "Loaded '{}' ({} bytes)", path.display(), bytes.len());
        Ok(bytes)
    }
}

#[cfg(test)]
#[path = "shader_source_tests.rs"]
mod tests;
