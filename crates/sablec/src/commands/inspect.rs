//! Inspect command - validate a NEF file and print its contents.

use anyhow::{Context, Result};
use clap::Args;
use sable_bytecode::NefFile;
use std::fmt::Write;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct InspectCommand {
    /// Executable to inspect
    pub input: PathBuf,
}

impl InspectCommand {
    pub fn run(&self) -> Result<()> {
        let bytes = std::fs::read(&self.input)
            .with_context(|| format!("Failed to read {}", self.input.display()))?;
        let nef = NefFile::from_bytes(&bytes)
            .with_context(|| format!("Invalid executable {}", self.input.display()))?;
        print!("{}", render(&nef)?);
        Ok(())
    }
}

/// Header, token table and disassembly
pub fn render(nef: &NefFile) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "Compiler: {}", nef.compiler)?;
    if !nef.source.is_empty() {
        writeln!(out, "Source:   {}", nef.source)?;
    }
    writeln!(out, "Checksum: 0x{:08x}", nef.checksum)?;
    writeln!(out, "Script:   {} bytes", nef.script.len())?;

    if !nef.tokens.is_empty() {
        writeln!(out, "\nTokens:")?;
        for (index, token) in nef.tokens.iter().enumerate() {
            writeln!(out, "  [{index}] {token}")?;
        }
    }

    writeln!(out, "\nDisassembly:")?;
    for instruction in nef.instructions()? {
        writeln!(out, "  {instruction}")?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_bytecode::{CallFlags, Hash160, MethodToken};

    #[test]
    fn test_render() {
        let nef = NefFile::builder("sablec test")
            .tokens(vec![MethodToken {
                hash: Hash160([0xAB; 20]),
                method: "symbol".into(),
                parameters_count: 0,
                has_return_value: true,
                call_flags: CallFlags::READ_ONLY,
            }])
            .script(vec![0x37, 0x00, 0x00, 0x22, 0x02, 0x40])
            .build()
            .unwrap();
        let text = render(&nef).unwrap();
        assert!(text.starts_with("Compiler: sablec test\n"));
        assert!(text.contains("[0] "));
        assert!(text.contains("symbol"));
        assert!(text.contains("CALLT"));
        assert!(text.contains("JMP +2 (-> 0005)"));
        assert!(text.contains("0005: RET"));
    }

    #[test]
    fn test_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.nef");
        std::fs::write(&path, b"not a nef").unwrap();
        let err = InspectCommand { input: path }.run().unwrap_err();
        assert!(err.to_string().starts_with("Invalid executable"));
    }
}
