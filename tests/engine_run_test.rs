//! End-to-end engine scenarios: small hand-assembled story images run
//! through `Engine::run` against a `ScriptedHost`, exercising the full
//! fetch-decode-dispatch loop rather than one opcode at a time.

use zmachine::engine::Engine;
use zmachine::host::{HeadlessHost, Host, ScriptedHost};
use zmachine::zrand::ZRand;

fn story_with_program(version: u8, program: &[u8]) -> Vec<u8> {
    let mut bytes = vec![0u8; 64 + program.len()];
    bytes[0x00] = version;
    bytes[0x06] = 0x00;
    bytes[0x07] = 0x40; // initial PC = 0x40, right after the header
    bytes[0x0C] = 0x00;
    bytes[0x0D] = 0x20; // globals at 0x20, well inside the header region
    bytes[0x0E] = 0x00;
    bytes[0x0F] = 0x40; // static memory starts where the program starts
    bytes[0x12..0x18].copy_from_slice(b"010101");
    bytes[64..].copy_from_slice(program);
    bytes
}

#[test]
fn prints_a_number_then_quits() {
    // print_num 42 ; new_line ; quit
    let program = [0xE6, 0x7F, 42, 0xBB, 0xBA];
    let bytes = story_with_program(3, &program);
    let mut engine = Engine::new(bytes, ZRand::new_predictable(1)).unwrap();
    let mut host = ScriptedHost::default();

    engine.run(&mut host).unwrap();

    assert_eq!(host.printed, "42\n");
    assert!(host.quit_called);
}

#[test]
fn arithmetic_then_branch_then_quit() {
    // add 20,22 -> G16 ; je G16,42 ?(skip print_num) ; print_num G16 ; quit
    // add (long form 0x14, small/small) store to global 16 (var byte 16)
    // je (long form 0x01, small/variable): compares G16 to small constant 42,
    // branch on true with a short forward offset over the print_num block.
    let program = [
        0x14, 20, 22, 16, // add 20 22 -> global 16
        0x41, 16, 42, 0xC0 | 5, // je Gvar16, #42 ; branch true, short offset 5 (over print_num)
        0xE6, 0x7F, 99, // print_num 99 (skipped if branch taken)
        0xBA, // quit
    ];
    let bytes = story_with_program(3, &program);
    let mut engine = Engine::new(bytes, ZRand::new_predictable(1)).unwrap();
    let mut host = ScriptedHost::default();

    engine.run(&mut host).unwrap();

    assert_eq!(host.printed, "");
    assert!(host.quit_called);
}

#[test]
fn headless_host_runs_a_minimal_story_to_quit() {
    let bytes = story_with_program(3, &[0xBA]);
    let mut engine = Engine::new(bytes, ZRand::new_uniform()).unwrap();
    let mut host = HeadlessHost::default();
    engine.run(&mut host).unwrap();
    assert!(host.quit_called);
}
