//! Save/restore wired through a real `Engine`-constructed `Vm`: mutate
//! state via actual instruction stepping, snapshot it, corrupt it further,
//! then restore and confirm the snapshot — not just the decompressor.

use zmachine::engine::Engine;
use zmachine::host::ScriptedHost;
use zmachine::quetzal;
use zmachine::zrand::ZRand;

fn story_with_program(program: &[u8]) -> Vec<u8> {
    let mut bytes = vec![0u8; 64 + program.len()];
    bytes[0x00] = 3;
    bytes[0x06] = 0x00;
    bytes[0x07] = 0x40;
    bytes[0x0C] = 0x00;
    bytes[0x0D] = 0x20;
    bytes[0x0E] = 0x00;
    bytes[0x0F] = 0x40;
    bytes[0x12..0x18].copy_from_slice(b"010101");
    bytes[64..].copy_from_slice(program);
    bytes
}

#[test]
fn restore_undoes_memory_and_stack_changes_made_after_the_snapshot() {
    // push 5 ; push 9 ; quit -- we only need a reachable state, not a full run.
    let program = [0xE8, 0x7F, 5, 0xE8, 0x7F, 9, 0xBA];
    let original = story_with_program(&program);
    let mut engine = Engine::new(original.clone(), ZRand::new_predictable(7)).unwrap();
    let mut host = ScriptedHost::default();

    // Execute the two pushes, landing right before `quit`.
    engine.step(&mut host).unwrap();
    engine.step(&mut host).unwrap();
    assert_eq!(engine.vm.stack, vec![5, 9]);

    engine.vm.memory.storeb(0x30, 0xAB).unwrap();
    let snapshot = quetzal::save_state(&engine.vm, &original);

    // Corrupt memory and the stack further.
    engine.vm.memory.storeb(0x30, 0x00).unwrap();
    engine.vm.push(123);
    engine.vm.pc = 0;

    quetzal::restore_state(&mut engine.vm, &snapshot).unwrap();

    assert_eq!(engine.vm.memory.loadb(0x30).unwrap(), 0xAB);
    assert_eq!(engine.vm.stack, vec![5, 9]);
    assert_eq!(engine.vm.pc, original_pc_before_quit(&program));
}

fn original_pc_before_quit(program: &[u8]) -> u32 {
    // The program sits right after the 64-byte header; `quit` is its last byte.
    64 + program.len() as u32 - 1
}

#[test]
fn restore_rejects_a_snapshot_from_a_different_story() {
    let program = [0xBA];
    let story_a = story_with_program(&program);
    let mut story_b = story_with_program(&program);
    story_b[0x1C] ^= 0xFF; // different checksum bytes

    let engine_a = Engine::new(story_a.clone(), ZRand::new_uniform()).unwrap();
    let snapshot = quetzal::save_state(&engine_a.vm, &story_a);

    let mut engine_b = Engine::new(story_b, ZRand::new_uniform()).unwrap();
    assert!(quetzal::restore_state(&mut engine_b.vm, &snapshot).is_err());
}
