//! EXT `save`/`restore` (v5+) wired through real opcode dispatch: confirms
//! that a successful restore delivers its result to the *original* `save`
//! instruction's destination, not to whatever variable the current
//! `restore` call happens to name.

use zmachine::engine::Engine;
use zmachine::header::Header;
use zmachine::host::ScriptedHost;
use zmachine::zrand::ZRand;

const SAVE_RESULT_VAR: u8 = 16; // global 0
const RESTORE_RESULT_VAR: u8 = 17; // global 1, deliberately different

fn ext_story(program: &[u8]) -> Vec<u8> {
    let mut bytes = vec![0u8; 64 + program.len()];
    bytes[0x00] = 5;
    bytes[0x06] = 0x00;
    bytes[0x07] = 0x40; // initial pc
    bytes[0x0C] = 0x00;
    bytes[0x0D] = 0x20; // globals table
    bytes[0x0E] = 0x00;
    bytes[0x0F] = 0x40; // static base
    bytes[0x12..0x18].copy_from_slice(b"990101");
    bytes[64..].copy_from_slice(program);
    let checksum = Header::compute_checksum(&bytes);
    bytes[0x1C] = (checksum >> 8) as u8;
    bytes[0x1D] = (checksum & 0xFF) as u8;
    bytes
}

#[test]
fn ext_restore_stores_its_result_in_the_original_save_instructions_variable() {
    // ext:save -> G00 ; ext:restore -> G01
    let program = [
        0xBE, 0x00, 0xFF, SAVE_RESULT_VAR, // save $00, store G00
        0xBE, 0x01, 0xFF, RESTORE_RESULT_VAR, // restore $01, store G01
    ];
    let story = ext_story(&program);
    let mut engine = Engine::new(story, ZRand::new_predictable(3)).unwrap();
    let mut host = ScriptedHost::default();

    // Execute `save`. Live completion stores 1 into G00.
    engine.step(&mut host).unwrap();
    assert_eq!(engine.vm.memory.read_global(0x20, SAVE_RESULT_VAR).unwrap(), 1);
    assert!(host.save_slot.is_some());

    // Corrupt G00 as if the story continued running after the save point.
    engine
        .vm
        .memory
        .write_global(0x20, SAVE_RESULT_VAR, 42)
        .unwrap();

    // Execute `restore`. On success the VM is wholesale-replaced by the
    // snapshot, which already carries "2" baked into G00 — the save
    // instruction's own destination — not G01.
    engine.step(&mut host).unwrap();

    assert_eq!(
        engine.vm.memory.read_global(0x20, SAVE_RESULT_VAR).unwrap(),
        2,
        "restore must deliver its result to the save instruction's own variable"
    );
    assert_eq!(
        engine.vm.memory.read_global(0x20, RESTORE_RESULT_VAR).unwrap(),
        0,
        "the restore instruction's own destination must be untouched on success"
    );
    // Execution resumes right after the save instruction, same as the
    // live run did — not re-running the restore instruction.
    assert_eq!(engine.vm.pc, 64 + 4);
}

#[test]
fn ext_restore_reports_failure_through_its_own_variable() {
    let program = [
        0xBE, 0x01, 0xFF, RESTORE_RESULT_VAR, // restore $01, store G01
    ];
    let story = ext_story(&program);
    let mut engine = Engine::new(story, ZRand::new_predictable(3)).unwrap();
    let mut host = ScriptedHost::default(); // no prior save, restore() returns None

    engine.step(&mut host).unwrap();

    assert_eq!(
        engine.vm.memory.read_global(0x20, RESTORE_RESULT_VAR).unwrap(),
        0
    );
}
