//! JSON description of lowered methods, as handed over by a front-end.
//!
//! ```json
//! {
//!   "name": "Counter",
//!   "methods": [{
//!     "name": "main",
//!     "export": { "safe": false, "returntype": "Integer" },
//!     "body": [
//!       { "opcode": "LDSFLD", "static": "count" },
//!       { "opcode": "JMPIFNOT_L", "target": "zero" },
//!       { "opcode": "RET" },
//!       { "label": "zero", "opcode": "PUSH0" },
//!       { "opcode": "RET" }
//!     ]
//!   }]
//! }
//! ```
//!
//! Labels are global, so a branch may name a label in another method. A
//! method name is also a valid target and stands for the method's first
//! instruction.

use anyhow::{Context, Result, bail};
use sable_bytecode::{MethodToken, Opcode};
use sable_compiler::{
    AbiEvent, CompilationContext, ExportedMethod, Instruction, InstructionId, MethodSet,
    Parameter, ParameterType, Permission,
};
use serde::Deserialize;
use std::collections::HashMap;

/// Whole program
#[derive(Debug, Deserialize)]
pub struct Program {
    /// Contract name
    pub name: String,

    /// Implemented standards
    #[serde(default, rename = "supportedstandards")]
    pub supported_standards: Vec<String>,

    /// Method bodies, in layout order
    pub methods: Vec<MethodDef>,

    /// Declared events
    #[serde(default)]
    pub events: Vec<AbiEvent>,

    /// Permissions beyond those implied by method tokens
    #[serde(default)]
    pub permissions: Vec<Permission>,

    /// Vendor metadata
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One lowered method
#[derive(Debug, Deserialize)]
pub struct MethodDef {
    /// Internal name, usable as a branch target
    pub name: String,

    /// ABI entry, if the method is public
    #[serde(default)]
    pub export: Option<ExportDef>,

    /// Instructions
    pub body: Vec<InstructionDef>,
}

/// ABI metadata of a public method
#[derive(Debug, Deserialize)]
pub struct ExportDef {
    /// Exported name, defaults to the method name
    #[serde(default)]
    pub name: Option<String>,

    /// Read-only method
    #[serde(default)]
    pub safe: bool,

    /// Parameters
    #[serde(default)]
    pub parameters: Vec<Parameter>,

    /// Return type
    #[serde(default = "default_return_type", rename = "returntype")]
    pub return_type: ParameterType,
}

fn default_return_type() -> ParameterType {
    ParameterType::Void
}

/// One abstract instruction
#[derive(Debug, Deserialize)]
pub struct InstructionDef {
    /// Label other instructions may branch to
    #[serde(default)]
    pub label: Option<String>,

    /// Opcode mnemonic, e.g. `JMP_L`
    pub opcode: String,

    /// Operand bytes as hex
    #[serde(default)]
    pub operand: Option<String>,

    /// Branch target label or method name
    #[serde(default)]
    pub target: Option<String>,

    /// Finally handler of `TRY` / `TRY_L`
    #[serde(default)]
    pub target2: Option<String>,

    /// External call; the operand becomes the token index
    #[serde(default)]
    pub token: Option<MethodToken>,

    /// Static field; the operand becomes its slot index
    #[serde(default, rename = "static")]
    pub static_field: Option<String>,
}

struct PendingBranch<'p> {
    id: InstructionId,
    target: Option<&'p str>,
    target2: Option<&'p str>,
}

impl Program {
    /// Parse a program description
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Feed the program into a fresh compilation context
    pub fn lower(&self) -> Result<CompilationContext> {
        let mut ctx = CompilationContext::new(&self.name);
        for standard in &self.supported_standards {
            ctx.add_supported_standard(standard.clone());
        }
        for event in &self.events {
            ctx.export_event(event.name.clone(), event.parameters.clone());
        }
        for permission in &self.permissions {
            match &permission.methods {
                MethodSet::Wildcard => ctx.add_permission(permission.contract.clone(), ["*"]),
                MethodSet::List(methods) => ctx.add_permission(
                    permission.contract.clone(),
                    methods.iter().map(String::as_str),
                ),
            }
        }
        for (key, value) in &self.extra {
            ctx.set_extra(key.clone(), value.clone());
        }

        let mut labels: HashMap<&str, InstructionId> = HashMap::new();
        let mut entries: HashMap<&str, InstructionId> = HashMap::new();
        let mut pending = Vec::new();

        for method in &self.methods {
            let method_id = ctx.define_method(method.name.clone());
            for (index, def) in method.body.iter().enumerate() {
                let instruction = lower_instruction(&mut ctx, def)
                    .with_context(|| format!("{}[{}] ({})", method.name, index, def.opcode))?;
                let id = ctx.alloc(instruction);
                ctx.place(method_id, id)?;

                if index == 0 {
                    entries.insert(method.name.as_str(), id);
                }
                if let Some(label) = &def.label
                    && labels.insert(label.as_str(), id).is_some()
                {
                    bail!("Label '{}' is defined more than once", label);
                }
                if def.target.is_some() || def.target2.is_some() {
                    pending.push(PendingBranch {
                        id,
                        target: def.target.as_deref(),
                        target2: def.target2.as_deref(),
                    });
                }
            }

            if let Some(export) = &method.export {
                ctx.export_method(ExportedMethod {
                    method: method_id,
                    name: export.name.clone().unwrap_or_else(|| method.name.clone()),
                    safe: export.safe,
                    parameters: export.parameters.clone(),
                    return_type: export.return_type,
                });
            }
        }

        let resolve = |name: &str| -> Result<InstructionId> {
            labels
                .get(name)
                .or_else(|| entries.get(name))
                .copied()
                .with_context(|| format!("Unknown label or method '{name}'"))
        };
        for branch in pending {
            if let Some(target) = branch.target {
                let target = resolve(target)?;
                ctx.instruction_mut(branch.id)?.set_target(target)?;
            }
            if let Some(target2) = branch.target2 {
                let target2 = resolve(target2)?;
                ctx.instruction_mut(branch.id)?.set_target2(target2)?;
            }
        }

        ctx.emit_initializer()?;
        Ok(ctx)
    }
}

fn lower_instruction(ctx: &mut CompilationContext, def: &InstructionDef) -> Result<Instruction> {
    let opcode =
        Opcode::from_name(&def.opcode).with_context(|| format!("Unknown opcode '{}'", def.opcode))?;
    let mut instruction = Instruction::new(opcode);

    let sources = [def.operand.is_some(), def.token.is_some(), def.static_field.is_some()];
    if sources.iter().filter(|&&set| set).count() > 1 {
        bail!("Only one of operand, token and static may be given");
    }

    if let Some(token) = &def.token {
        let index = ctx.add_method_token(token.clone())?;
        instruction.set_operand(index.to_le_bytes().to_vec())?;
    } else if let Some(field) = &def.static_field {
        let slot = ctx.add_static_field(field.clone())?;
        instruction.set_operand(vec![slot])?;
    } else if let Some(operand) = &def.operand {
        let bytes = hex::decode(operand).context("Operand is not valid hex")?;
        instruction.set_operand(bytes)?;
    }
    Ok(instruction)
}

#[cfg(test)]
mod tests {
    use super::*;

    const COUNTER: &str = r#"{
        "name": "Counter",
        "supportedstandards": ["NEP-0"],
        "methods": [
            {
                "name": "main",
                "export": { "safe": true, "returntype": "Integer" },
                "body": [
                    { "opcode": "LDSFLD", "static": "count" },
                    { "opcode": "JMPIFNOT", "target": "zero" },
                    { "opcode": "CALL", "target": "helper" },
                    { "opcode": "RET" },
                    { "label": "zero", "opcode": "PUSH0" },
                    { "opcode": "RET" }
                ]
            },
            {
                "name": "helper",
                "body": [
                    { "opcode": "CALLT", "token": {
                        "hash": "0x0102030405060708090a0b0c0d0e0f1011121314",
                        "method": "balanceOf",
                        "parameters_count": 1,
                        "has_return_value": true,
                        "call_flags": 15
                    } },
                    { "opcode": "RET" }
                ]
            }
        ],
        "events": [{ "name": "Bump", "parameters": [{ "name": "by", "type": "Integer" }] }]
    }"#;

    #[test]
    fn test_lower_and_compile() {
        let program = Program::from_json(COUNTER).unwrap();
        let ctx = program.lower().unwrap();
        assert_eq!(ctx.static_field_count(), 1);

        let compiled = ctx.compile().unwrap();
        // LDSFLD 0, JMPIFNOT +5, CALL +5, RET, PUSH0, RET, CALLT 0, RET, INITSSLOT 1, RET
        assert_eq!(
            compiled.script(),
            &[
                0x5F, 0, 0x26, 5, 0x34, 5, 0x40, 0x10, 0x40, 0x37, 0, 0, 0x40, 0x56, 1, 0x40
            ]
        );
        let manifest = compiled.create_manifest();
        assert_eq!(manifest.abi.methods.len(), 2);
        assert_eq!(manifest.method("_initialize").unwrap().offset, 13);
        assert_eq!(manifest.permissions.len(), 1);
        assert_eq!(
            manifest.permissions[0].contract,
            "0x0102030405060708090a0b0c0d0e0f1011121314"
        );
        assert_eq!(manifest.abi.events[0].name, "Bump");
    }

    #[test]
    fn test_unknown_label() {
        let program = Program::from_json(
            r#"{"name": "X", "methods": [{"name": "m", "body": [{"opcode": "JMP", "target": "nowhere"}]}]}"#,
        )
        .unwrap();
        let err = program.lower().unwrap_err();
        assert!(err.to_string().contains("nowhere"));
    }

    #[test]
    fn test_bad_opcode_names_location() {
        let program = Program::from_json(
            r#"{"name": "X", "methods": [{"name": "m", "body": [{"opcode": "RET"}, {"opcode": "FLY"}]}]}"#,
        )
        .unwrap();
        let err = program.lower().unwrap_err();
        assert_eq!(err.to_string(), "m[1] (FLY)");
        assert!(format!("{err:#}").contains("Unknown opcode 'FLY'"));
    }

    #[test]
    fn test_operand_hex() {
        let program = Program::from_json(
            r#"{"name": "X", "methods": [{"name": "m", "body": [
                {"opcode": "PUSHDATA1", "operand": "cafe"},
                {"opcode": "PUSHINT16", "operand": "0100"},
                {"opcode": "RET"}
            ]}]}"#,
        )
        .unwrap();
        let compiled = program.lower().unwrap().compile().unwrap();
        assert_eq!(
            compiled.script(),
            &[0x0C, 2, 0xCA, 0xFE, 0x01, 0x01, 0x00, 0x40]
        );
    }
}
