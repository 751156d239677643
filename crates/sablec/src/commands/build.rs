//! Build command - link a lowered program into a NEF file and manifest.
//!
//! Usage:
//! - `sablec build token.json` - writes `token.nef` and `token.manifest.json`
//! - `sablec build token.json -o out/token` - writes `out/token.nef` and `out/token.manifest.json`

use anyhow::{Context, Result};
use clap::Args;
use sable_compiler::optimize_executable;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::program::Program;

#[derive(Args, Debug)]
pub struct BuildCommand {
    /// Program description (JSON)
    pub program: PathBuf,

    /// Output path without extension
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Skip dead code elimination
    #[arg(long)]
    pub no_optimize: bool,
}

impl BuildCommand {
    pub fn run(&self, config: &Config) -> Result<()> {
        let (nef_path, manifest_path) = self.output_paths();

        let source = std::fs::read_to_string(&self.program)
            .with_context(|| format!("Failed to read {}", self.program.display()))?;
        let program = Program::from_json(&source)
            .with_context(|| format!("Failed to parse {}", self.program.display()))?;

        let mut ctx = program.lower()?;
        ctx.set_source(config.compiler.source.clone());
        let compiled = ctx.compile()?;
        let mut nef = compiled.create_executable(&config.compiler.id)?;
        let mut manifest = compiled.create_manifest();

        if config.optimizer.dead_code && !self.no_optimize {
            let entries: Vec<usize> = manifest
                .abi
                .methods
                .iter()
                .map(|m| m.offset as usize)
                .collect();
            let optimized = optimize_executable(&nef, &entries)?;
            optimized.remap_manifest(&mut manifest)?;
            if optimized.removed > 0 {
                tracing::debug!("Removed {} unreachable instructions", optimized.removed);
            }
            nef = optimized.nef;
        }

        if let Some(dir) = nef_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        std::fs::write(&nef_path, nef.to_bytes()?)
            .with_context(|| format!("Failed to write {}", nef_path.display()))?;
        std::fs::write(&manifest_path, manifest.to_json()?)
            .with_context(|| format!("Failed to write {}", manifest_path.display()))?;

        println!(
            "Built {} ({} bytes, checksum 0x{:08x})",
            nef_path.display(),
            nef.script.len(),
            nef.checksum
        );
        println!("Wrote {}", manifest_path.display());
        Ok(())
    }

    fn output_paths(&self) -> (PathBuf, PathBuf) {
        let base = self
            .output
            .clone()
            .unwrap_or_else(|| self.program.with_extension(""));
        (with_suffix(&base, ".nef"), with_suffix(&base, ".manifest.json"))
    }
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_bytecode::NefFile;
    use sable_compiler::Manifest;

    const PROGRAM: &str = r#"{
        "name": "Demo",
        "methods": [
            {
                "name": "main",
                "export": { "returntype": "Integer" },
                "body": [
                    { "opcode": "PUSH1" },
                    { "opcode": "RET" },
                    { "opcode": "PUSH2" },
                    { "opcode": "RET" }
                ]
            }
        ]
    }"#;

    fn config(dead_code: bool) -> Config {
        let mut config = Config::default();
        config.compiler.id = "sablec test".to_string();
        config.optimizer.dead_code = dead_code;
        config
    }

    #[test]
    fn test_build_writes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let program = dir.path().join("demo.json");
        std::fs::write(&program, PROGRAM).unwrap();

        let cmd = BuildCommand {
            program: program.clone(),
            output: None,
            no_optimize: false,
        };
        cmd.run(&config(true)).unwrap();

        let nef = NefFile::from_bytes(&std::fs::read(dir.path().join("demo.nef")).unwrap()).unwrap();
        assert_eq!(nef.compiler, "sablec test");
        assert_eq!(nef.script, vec![0x11, 0x40]);

        let manifest = std::fs::read_to_string(dir.path().join("demo.manifest.json")).unwrap();
        let manifest = Manifest::from_json(&manifest).unwrap();
        assert_eq!(manifest.name, "Demo");
        assert_eq!(manifest.method("main").unwrap().offset, 0);
    }

    #[test]
    fn test_build_without_optimizer() {
        let dir = tempfile::tempdir().unwrap();
        let program = dir.path().join("demo.json");
        std::fs::write(&program, PROGRAM).unwrap();

        let cmd = BuildCommand {
            program,
            output: Some(dir.path().join("out").join("demo")),
            no_optimize: false,
        };
        cmd.run(&config(false)).unwrap();

        let bytes = std::fs::read(dir.path().join("out").join("demo.nef")).unwrap();
        let nef = NefFile::from_bytes(&bytes).unwrap();
        assert_eq!(nef.script, vec![0x11, 0x40, 0x12, 0x40]);
        assert!(dir.path().join("out").join("demo.manifest.json").exists());
    }

    #[test]
    fn test_invalid_token_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let token = |method: &str, flags: u8| {
            format!(
                r#"{{
                    "name": "Demo",
                    "methods": [{{
                        "name": "main",
                        "body": [
                            {{ "opcode": "CALLT", "token": {{
                                "hash": "0x0102030405060708090a0b0c0d0e0f1011121314",
                                "method": "{method}",
                                "parameters_count": 0,
                                "has_return_value": false,
                                "call_flags": {flags}
                            }} }},
                            {{ "opcode": "RET" }}
                        ]
                    }}]
                }}"#
            )
        };

        for (name, source) in [("flags", token("update", 16)), ("private", token("_deploy", 15))] {
            let program = dir.path().join(format!("{name}.json"));
            std::fs::write(&program, source).unwrap();
            let cmd = BuildCommand {
                program,
                output: None,
                no_optimize: true,
            };
            assert!(cmd.run(&config(false)).is_err(), "{name}");
            assert!(!dir.path().join(format!("{name}.nef")).exists());
            assert!(!dir.path().join(format!("{name}.manifest.json")).exists());
        }
    }

    #[test]
    fn test_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = BuildCommand {
            program: dir.path().join("missing.json"),
            output: None,
            no_optimize: true,
        };
        let err = cmd.run(&config(true)).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
