//! Dead code elimination on linked scripts

use proptest::prelude::*;
use sable_bytecode::{NefFile, NefInstruction, Opcode, decode_script, encode_script};
use sable_compiler::{
    CompilationContext, DeadCodeEliminator, ExportedMethod, Instruction, InstructionArena,
    ParameterType, Script, link, optimize_executable,
};

fn ins(opcode: Opcode, operand: &[u8]) -> NefInstruction {
    NefInstruction::new(opcode, operand.to_vec()).unwrap()
}

fn optimize(instructions: &[NefInstruction]) -> Vec<u8> {
    let mut script = Script::decode(&encode_script(instructions)).unwrap();
    DeadCodeEliminator::new().run(&mut script).unwrap();
    script.encode()
}

#[test]
fn test_unreferenced_leading_nop() {
    // NOP, JMP +2, RET
    let script = optimize(&[
        ins(Opcode::Nop, &[]),
        ins(Opcode::Jmp, &[2]),
        ins(Opcode::Ret, &[]),
    ]);
    assert_eq!(script, vec![0x22, 0x02, 0x40]);

    let decoded = decode_script(&script).unwrap();
    assert_eq!(decoded[0].offset(), 0);
    assert_eq!(decoded[1].offset(), 2);
    assert_eq!(decoded[0].targets().unwrap(), vec![2]);
}

#[test]
fn test_conditional_fallthrough_is_reachable() {
    let original = [
        ins(Opcode::JmpIf, &[4]),
        ins(Opcode::Push1, &[]),
        ins(Opcode::Ret, &[]),
        ins(Opcode::Ret, &[]),
    ];
    assert_eq!(optimize(&original), encode_script(&original));
}

#[test]
fn test_backward_jump_into_skipped_region() {
    // 0: JMP_L -> 7, 5: PUSH1, 6: RET, 7: JMP_L -> 5
    let original = [
        ins(Opcode::JmpL, &7i32.to_le_bytes()),
        ins(Opcode::Push1, &[]),
        ins(Opcode::Ret, &[]),
        ins(Opcode::JmpL, &(-2i32).to_le_bytes()),
    ];
    assert_eq!(optimize(&original), encode_script(&original));
}

#[test]
fn test_skipped_region_between_terminators() {
    // 0: JMP -> 5, 2: PUSH1, 3: PUSH2, 4: THROW, 5: RET
    let script = optimize(&[
        ins(Opcode::Jmp, &[5]),
        ins(Opcode::Push1, &[]),
        ins(Opcode::Push2, &[]),
        ins(Opcode::Throw, &[]),
        ins(Opcode::Ret, &[]),
    ]);
    assert_eq!(script, vec![0x22, 0x02, 0x40]);
}

#[test]
fn test_try_handlers_are_reachable() {
    // 0: TRY catch -> 6, finally none; 3: PUSH1; 4: ENDTRY -> 7; 6: RET; 7: RET; 8: PUSH2
    let original = [
        ins(Opcode::Try, &[6, 0]),
        ins(Opcode::Push1, &[]),
        ins(Opcode::EndTry, &[3]),
        ins(Opcode::Ret, &[]),
        ins(Opcode::Ret, &[]),
        ins(Opcode::Push2, &[]),
    ];
    let script = optimize(&original);
    let mut expected = encode_script(&original);
    expected.pop();
    assert_eq!(script, expected);
}

fn build_contract() -> (NefFile, sable_compiler::Manifest) {
    let mut ctx = CompilationContext::new("Demo");
    let main = ctx.define_method("main");
    let unused = ctx.define_method("unused");
    let helper = ctx.define_method("helper");

    let helper_entry = ctx.alloc(Instruction::push_int(42));
    ctx.push(main, Instruction::branch(Opcode::CallL, helper_entry).unwrap())
        .unwrap();
    ctx.push(main, Instruction::new(Opcode::Ret)).unwrap();
    ctx.push(unused, Instruction::push_int(7)).unwrap();
    ctx.push(unused, Instruction::new(Opcode::Ret)).unwrap();
    ctx.place(helper, helper_entry).unwrap();
    ctx.push(helper, Instruction::new(Opcode::Ret)).unwrap();

    for (method, name) in [(main, "main"), (unused, "unused"), (helper, "helper")] {
        ctx.export_method(ExportedMethod {
            method,
            name: name.into(),
            safe: false,
            parameters: vec![],
            return_type: ParameterType::Integer,
        });
    }
    let compiled = ctx.compile().unwrap();
    (
        compiled.create_executable("sablec test").unwrap(),
        compiled.create_manifest(),
    )
}

#[test]
fn test_optimize_executable_drops_unreachable_method() {
    let (nef, _) = build_contract();
    // CALL_L +8, RET, PUSH7, RET, PUSHINT8 42, RET
    assert_eq!(nef.script.len(), 11);

    let optimized = optimize_executable(&nef, &[]).unwrap();
    assert_eq!(optimized.removed, 2);
    assert_eq!(optimized.nef.script, vec![0x35, 6, 0, 0, 0, 0x40, 0x00, 42, 0x40]);
    assert_eq!(optimized.nef.compiler, nef.compiler);
    assert_eq!(optimized.nef.tokens, nef.tokens);
    assert_eq!(
        NefFile::from_bytes(&optimized.nef.to_bytes().unwrap()).unwrap(),
        optimized.nef
    );
}

#[test]
fn test_exported_methods_as_entry_points() {
    let (nef, mut manifest) = build_contract();
    let entries: Vec<usize> = manifest
        .abi
        .methods
        .iter()
        .map(|m| m.offset as usize)
        .collect();
    let optimized = optimize_executable(&nef, &entries).unwrap();
    assert_eq!(optimized.removed, 0);
    assert_eq!(optimized.nef.script, nef.script);

    optimized.remap_manifest(&mut manifest).unwrap();
    assert_eq!(manifest.method("helper").unwrap().offset, 8);
}

#[test]
fn test_manifest_remap_after_removal() {
    let (nef, mut manifest) = build_contract();
    let optimized = optimize_executable(&nef, &[]).unwrap();
    manifest.abi.methods.retain(|m| m.name != "unused");
    optimized.remap_manifest(&mut manifest).unwrap();
    assert_eq!(manifest.method("main").unwrap().offset, 0);
    assert_eq!(manifest.method("helper").unwrap().offset, 6);

    let (_, mut full) = build_contract();
    assert!(optimized.remap_manifest(&mut full).is_err());
}

#[derive(Debug, Clone)]
enum Shape {
    Plain(Opcode),
    Branch(Opcode, usize),
    Try(usize, Option<usize>),
}

fn arb_shape() -> impl Strategy<Value = Shape> {
    prop_oneof![
        prop::sample::select(vec![
            Opcode::Nop,
            Opcode::Push1,
            Opcode::Drop,
            Opcode::Ret,
            Opcode::Throw,
            Opcode::Abort,
            Opcode::Assert,
        ])
        .prop_map(Shape::Plain),
        (
            prop::sample::select(vec![Opcode::JmpL, Opcode::JmpIfL, Opcode::CallL, Opcode::PushA]),
            any::<usize>()
        )
            .prop_map(|(op, t)| Shape::Branch(op, t)),
        (any::<usize>(), prop::option::of(any::<usize>())).prop_map(|(c, f)| Shape::Try(c, f)),
    ]
}

fn linked(shapes: &[Shape]) -> Vec<u8> {
    let mut arena = InstructionArena::new();
    let mut ids = vec![arena.alloc(Instruction::new(Opcode::Push1))];
    for shape in shapes {
        let opcode = match shape {
            Shape::Plain(op) | Shape::Branch(op, _) => *op,
            Shape::Try(..) => Opcode::TryL,
        };
        ids.push(arena.alloc(Instruction::new(opcode)));
    }
    let n = ids.len();
    for (shape, &id) in shapes.iter().zip(&ids[1..]) {
        let instruction = arena.get_mut(id).unwrap();
        match shape {
            Shape::Branch(_, t) => instruction.set_target(ids[t % n]).unwrap(),
            Shape::Try(c, f) => {
                instruction.set_target(ids[c % n]).unwrap();
                if let Some(f) = f {
                    instruction.set_target2(ids[f % n]).unwrap();
                }
            }
            Shape::Plain(_) => {}
        }
    }
    link(&mut arena, &ids).unwrap()
}

proptest! {
    #[test]
    fn prop_elimination_is_idempotent(shapes in prop::collection::vec(arb_shape(), 0..40)) {
        let mut script = Script::decode(&linked(&shapes)).unwrap();
        DeadCodeEliminator::new().run(&mut script).unwrap();
        let once = script.encode();

        let mut again = Script::decode(&once).unwrap();
        let map = DeadCodeEliminator::new().run(&mut again).unwrap();
        prop_assert_eq!(again.encode(), once);
        prop_assert!(map.iter().all(|(old, new)| old == new));
    }

    #[test]
    fn prop_survivors_keep_their_targets(shapes in prop::collection::vec(arb_shape(), 0..40)) {
        let original = decode_script(&linked(&shapes)).unwrap();
        let mut script = Script::decode(&linked(&shapes)).unwrap();
        let map = DeadCodeEliminator::new().run(&mut script).unwrap();

        // Every surviving address still names the same logical instruction
        for instruction in &original {
            let Some(&new_offset) = map.get(&instruction.offset()) else { continue };
            let rewritten = script
                .instructions()
                .iter()
                .find(|i| i.offset() == new_offset)
                .unwrap();
            prop_assert_eq!(rewritten.opcode(), instruction.opcode());
            for (old_target, new_target) in instruction.targets().unwrap().into_iter().zip(rewritten.targets().unwrap()) {
                prop_assert_eq!(map.get(&(old_target as usize)).map(|&o| o as i64), Some(new_target));
            }
        }
        prop_assert_eq!(script.instructions().first().map(|i| i.opcode()), Some(Opcode::Push1));
    }
}
