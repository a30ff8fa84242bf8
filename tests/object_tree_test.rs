//! Object tree wired end to end: a hand-built v3 story image, parsed through
//! the real `Header` and `Memory`, walked and mutated through `ObjectTree`'s
//! public API only -- no access to its internal test fixtures.

use zmachine::header::Header;
use zmachine::memory::Memory;
use zmachine::object::ObjectTree;
use zmachine::version::VersionPolicy;

const TABLE_ADDR: u16 = 0x40;

/// Three objects: 1 is the parent of 2 and 3 (2 is the first/younger child,
/// 3 its older sibling). Object 1 has property 5 set to 0x1234; objects
/// without it fall back to the property-defaults entry for that number.
fn build_v3_story() -> (Memory, ObjectTree) {
    let policy = VersionPolicy::for_version(3).unwrap();
    let defaults_bytes = policy.property_defaults_count() as usize * 2;
    let object_base = TABLE_ADDR as usize + defaults_bytes;
    let record_size = policy.object_record_size();
    let prop_area = object_base + 3 * record_size;

    // Object 1's property table: text-length 0 (no short name), then
    // property 5 (2 bytes) using the v3 size/number header byte.
    let obj1_props = prop_area;
    let obj1_prop_len = 1 + 2 + 2; // text-length byte + one 2-byte property + terminator
    // Objects 2 and 3 get empty property tables (just a text-length byte).
    let obj2_props = obj1_props + obj1_prop_len;
    let obj3_props = obj2_props + 1;
    let end = obj3_props + 1;

    let mut bytes = vec![0u8; end + 16];
    bytes[0x00] = 3;
    bytes[0x0E] = (TABLE_ADDR >> 8) as u8;
    bytes[0x0F] = (TABLE_ADDR & 0xFF) as u8;

    // Property defaults: entry for property 5 (index 4, 1-based) is 0x0099.
    let defaults_off = TABLE_ADDR as usize + (5 - 1) * 2;
    bytes[defaults_off] = 0x00;
    bytes[defaults_off + 1] = 0x99;

    // Object 1: parent 0, sibling 0, child 2, properties at obj1_props.
    let o1 = object_base;
    bytes[o1 + 4] = 0; // parent
    bytes[o1 + 5] = 0; // sibling
    bytes[o1 + 6] = 2; // child
    bytes[o1 + 7] = (obj1_props >> 8) as u8;
    bytes[o1 + 8] = (obj1_props & 0xFF) as u8;

    // Object 2: parent 1, sibling 3, child 0.
    let o2 = object_base + record_size;
    bytes[o2 + 4] = 1;
    bytes[o2 + 5] = 3;
    bytes[o2 + 6] = 0;
    bytes[o2 + 7] = (obj2_props >> 8) as u8;
    bytes[o2 + 8] = (obj2_props & 0xFF) as u8;

    // Object 3: parent 1, sibling 0, child 0.
    let o3 = object_base + 2 * record_size;
    bytes[o3 + 4] = 1;
    bytes[o3 + 5] = 0;
    bytes[o3 + 6] = 0;
    bytes[o3 + 7] = (obj3_props >> 8) as u8;
    bytes[o3 + 8] = (obj3_props & 0xFF) as u8;

    // Object 1's property table.
    bytes[obj1_props] = 0; // no short name
    let prop5_header = obj1_props + 1;
    bytes[prop5_header] = ((2 - 1) << 5) | 5; // v3 header: (size-1)<<5 | number
    bytes[prop5_header + 1] = 0x12;
    bytes[prop5_header + 2] = 0x34;
    bytes[prop5_header + 3] = 0; // terminator

    // Objects 2 and 3: empty property tables.
    bytes[obj2_props] = 0;
    bytes[obj3_props] = 0;

    bytes[0x1A] = ((bytes.len() / 2) >> 8) as u8;
    bytes[0x1B] = ((bytes.len() / 2) & 0xFF) as u8;

    let header = Header::new(&bytes);
    let memory = Memory::new(bytes, &header);
    let tree = ObjectTree::new(TABLE_ADDR, policy);
    (memory, tree)
}

#[test]
fn tree_links_match_the_hand_built_layout() {
    let (mem, tree) = build_v3_story();

    assert_eq!(tree.get_child(&mem, 1).unwrap(), 2);
    assert_eq!(tree.get_sibling(&mem, 2).unwrap(), 3);
    assert_eq!(tree.get_parent(&mem, 2).unwrap(), 1);
    assert_eq!(tree.get_parent(&mem, 3).unwrap(), 1);
    assert_eq!(tree.get_child(&mem, 2).unwrap(), 0);
}

#[test]
fn property_five_reads_its_explicit_value_others_fall_back_to_default() {
    let (mem, tree) = build_v3_story();

    assert_eq!(tree.get_property(&mem, 1, 5).unwrap(), 0x1234);
    // Object 2 has no property 5 of its own -- falls back to the defaults table.
    assert_eq!(tree.get_property(&mem, 2, 5).unwrap(), 0x0099);
}

#[test]
fn moving_an_object_updates_old_and_new_parents_sibling_chains() {
    let (mut mem, tree) = build_v3_story();

    tree.insert_into(&mut mem, 3, 2).unwrap();

    // 3 is no longer 1's child chain entry; 1's only remaining child is 2.
    assert_eq!(tree.get_child(&mem, 1).unwrap(), 2);
    assert_eq!(tree.get_sibling(&mem, 2).unwrap(), 0);
    // 3 is now 2's child.
    assert_eq!(tree.get_parent(&mem, 3).unwrap(), 2);
    assert_eq!(tree.get_child(&mem, 2).unwrap(), 3);
}

#[test]
fn attribute_bits_round_trip_without_disturbing_neighbours() {
    let (mut mem, tree) = build_v3_story();

    assert!(!tree.is_attr(&mem, 1, 0).unwrap());
    tree.set_attr(&mut mem, 1, 0).unwrap();
    tree.set_attr(&mut mem, 1, 31).unwrap();
    assert!(tree.is_attr(&mem, 1, 0).unwrap());
    assert!(tree.is_attr(&mem, 1, 31).unwrap());
    assert!(!tree.is_attr(&mem, 1, 15).unwrap());

    tree.clear_attr(&mut mem, 1, 0).unwrap();
    assert!(!tree.is_attr(&mem, 1, 0).unwrap());
    assert!(tree.is_attr(&mem, 1, 31).unwrap());

    // Object 2 is untouched.
    assert!(!tree.is_attr(&mem, 2, 0).unwrap());
}

#[test]
fn writing_an_existing_property_does_not_touch_the_defaults_table() {
    let (mut mem, tree) = build_v3_story();

    tree.set_property(&mut mem, 1, 5, 0xBEEF).unwrap();
    assert_eq!(tree.get_property(&mem, 1, 5).unwrap(), 0xBEEF);
    // Object 2 still sees the untouched default.
    assert_eq!(tree.get_property(&mem, 2, 5).unwrap(), 0x0099);
}

#[test]
fn object_zero_is_rejected_as_the_null_sentinel() {
    let (mem, tree) = build_v3_story();
    assert!(tree.object_addr(0).is_err());
    assert!(tree.get_parent(&mem, 0).is_err());
}
