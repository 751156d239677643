//! Optimize command - remove unreachable code from an existing NEF file.

use anyhow::{Context, Result};
use clap::Args;
use sable_bytecode::NefFile;
use sable_compiler::{Manifest, optimize_executable};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct OptimizeCommand {
    /// Executable to optimize
    pub input: PathBuf,

    /// Manifest whose exported methods are kept and whose offsets are rewritten
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Output file (defaults to overwriting the input)
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,
}

impl OptimizeCommand {
    pub fn run(&self) -> Result<()> {
        let bytes = std::fs::read(&self.input)
            .with_context(|| format!("Failed to read {}", self.input.display()))?;
        let nef = NefFile::from_bytes(&bytes)
            .with_context(|| format!("Invalid executable {}", self.input.display()))?;

        let mut manifest = match &self.manifest {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                Some(
                    Manifest::from_json(&text)
                        .with_context(|| format!("Failed to parse {}", path.display()))?,
                )
            }
            None => None,
        };

        let entries: Vec<usize> = manifest
            .iter()
            .flat_map(|m| m.abi.methods.iter().map(|method| method.offset as usize))
            .collect();
        let optimized = optimize_executable(&nef, &entries)?;

        // Both outputs are produced before anything on disk is replaced.
        let nef_bytes = optimized.nef.to_bytes()?;
        let manifest_json = match manifest.as_mut() {
            Some(manifest) => {
                optimized.remap_manifest(manifest)?;
                Some(manifest.to_json()?)
            }
            None => None,
        };

        let output = self.output.as_ref().unwrap_or(&self.input);
        std::fs::write(output, nef_bytes)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        if let (Some(json), Some(path)) = (manifest_json, &self.manifest) {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }

        println!(
            "Removed {} instructions: {} -> {} bytes",
            optimized.removed,
            nef.script.len(),
            optimized.nef.script.len()
        );
        Ok(())
    }
}
