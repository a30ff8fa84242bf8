//! The fetch-decode-dispatch loop, opcode dispatch tables, and I/O
//! suspension.
//!
//! Grounded on `interpreter.rs`'s `Interpreter`/`ExecutionResult` split
//! (`run_with_limit`'s fetch loop, `execute_0op`/`execute_1op`/
//! `execute_2op`/`execute_var` category dispatch, `do_branch`/`do_call`/
//! `do_return`), but opcodes are looked up through fixed-size arrays of
//! function pointers (one per normalized 2OP/1OP/0OP/VAR key, one for EXT)
//! built once in [`Engine::new`] instead of the original's large `match`
//! blocks, per the Design Notes.

use crate::dictionary;
use crate::error::ZError;
use crate::host::{Host, ReadCharReply, ReadLineReply, TextStyle, WindowId};
use crate::instruction::{BranchInfo, Instruction, InstructionForm, Operand, OperandCount};
use crate::object::ObjectTree;
use crate::quetzal;
use crate::vm::Vm;
use crate::zrand::ZRand;
use crate::zscii;
use log::trace;

/// What happened after one `step()` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Quit,
}

type OpcodeFn = fn(&mut Engine, &Instruction, &[u16], &mut dyn Host) -> Result<StepOutcome, ZError>;

const MAIN_TABLE_SIZE: usize = 96; // 32 (2OP) + 16 (1OP) + 16 (0OP) + 32 (VAR)
const EXT_TABLE_SIZE: usize = 32;

fn main_key(count: OperandCount, opcode: u8) -> usize {
    match count {
        OperandCount::Op2 => opcode as usize,
        OperandCount::Op1 => 32 + opcode as usize,
        OperandCount::Op0 => 48 + opcode as usize,
        OperandCount::Var => 64 + opcode as usize,
    }
}

fn rs(v: u16) -> i16 {
    v as i16
}

/// Owns the VM state plus the subsystems every opcode needs: the object
/// tree view, the RNG, and the opcode dispatch tables.
pub struct Engine {
    pub vm: Vm,
    pub objects: ObjectTree,
    pub rand: ZRand,
    original_bytes: Vec<u8>,
    table: [Option<OpcodeFn>; MAIN_TABLE_SIZE],
    ext_table: [Option<OpcodeFn>; EXT_TABLE_SIZE],
    instruction_count: u64,
    current_window: WindowId,
}

impl Engine {
    pub fn new(bytes: Vec<u8>, rand: ZRand) -> Result<Self, ZError> {
        let original_bytes = bytes.clone();
        let vm = Vm::new(bytes)?;
        let objects = ObjectTree::new(vm.header.object_table_addr, vm.policy);
        Ok(Engine {
            vm,
            objects,
            rand,
            original_bytes,
            table: build_main_table(),
            ext_table: build_ext_table(),
            instruction_count: 0,
            current_window: WindowId::Lower,
        })
    }

    pub fn instruction_count(&self) -> u64 {
        self.instruction_count
    }

    /// Run until the story quits or a fatal error occurs.
    pub fn run(&mut self, host: &mut dyn Host) -> Result<(), ZError> {
        loop {
            match self.step(host) {
                Ok(StepOutcome::Quit) => return Ok(()),
                Ok(StepOutcome::Continue) => continue,
                Err(e) => {
                    host.error(&e.to_string());
                    return Err(e);
                }
            }
        }
    }

    pub fn step(&mut self, host: &mut dyn Host) -> Result<StepOutcome, ZError> {
        let pc = self.vm.pc;
        let inst = Instruction::decode(&self.vm.memory, pc, self.vm.header.version)?;
        self.vm.pc = pc + inst.size as u32;
        self.instruction_count += 1;
        trace!(
            "#{} pc={:#06x} opcode={:#04x}",
            self.instruction_count,
            pc,
            inst.opcode
        );

        let operands = self.resolve_operands(&inst)?;

        let entry = if inst.form == InstructionForm::Extended {
            self.ext_table
                .get(inst.ext_opcode.unwrap_or(0xFF) as usize)
                .copied()
                .flatten()
        } else {
            self.table
                .get(main_key(inst.operand_count, inst.opcode))
                .copied()
                .flatten()
        };

        match entry {
            Some(f) => f(self, &inst, &operands, host),
            None => Err(ZError::UnsupportedOpcode {
                opcode: inst.ext_opcode.unwrap_or(inst.opcode),
                pc,
            }),
        }
    }

    fn resolve_operands(&mut self, inst: &Instruction) -> Result<Vec<u16>, ZError> {
        let mut values = Vec::with_capacity(inst.operands.len());
        for op in &inst.operands {
            let v = match op {
                Operand::Large(v) => *v,
                Operand::Small(v) => *v as u16,
                Operand::Variable(n) => self.vm.read_variable(*n)?,
            };
            values.push(v);
        }
        Ok(values)
    }

    fn store(&mut self, inst: &Instruction, value: u16) -> Result<(), ZError> {
        apply_store(&mut self.vm, inst.store_var, value)
    }

    /// Apply `inst`'s branch byte given the truth value the opcode
    /// computed. Offset 0/1 mean return false/true from the current
    /// routine instead of jumping.
    fn branch(&mut self, inst: &Instruction, condition: bool) -> Result<(), ZError> {
        apply_branch(&mut self.vm, inst.branch, condition)
    }

    fn decode_string_at(&self, addr: u32) -> Result<(String, usize), ZError> {
        zscii::decode_zstring(
            self.vm.memory.as_bytes(),
            addr as usize,
            self.vm.header.abbrev_table as usize,
            self.vm.header.version,
        )
    }

    /// `print`/`print_ret` carry their Z-string literal inline after the
    /// opcode byte rather than as an operand; decode it at the current PC
    /// and advance past it.
    fn print_literal(&mut self, host: &mut dyn Host) -> Result<(), ZError> {
        let (text, consumed) = self.decode_string_at(self.vm.pc)?;
        self.vm.pc += consumed as u32;
        host.print(self.current_window, &text);
        Ok(())
    }

    fn object_short_name(&self, obj: u16) -> Result<String, ZError> {
        let prop_table = self.objects.property_table_addr(&self.vm.memory, obj)?;
        let len = self.vm.memory.loadb(prop_table)?;
        if len == 0 {
            return Ok(String::new());
        }
        let (text, _) = self.decode_string_at(prop_table + 1)?;
        Ok(text)
    }

    fn checksum_matches(&self) -> bool {
        let computed = crate::header::Header::compute_checksum(&self.original_bytes);
        computed == self.vm.header.checksum_file
    }

    /// Snapshot the VM for Quetzal. The snapshot is taken from a clone with
    /// `inst`'s own success result already applied, so that a later restore
    /// of this image resumes as if `inst` (the save instruction) had just
    /// completed successfully — not as if whatever instruction triggers the
    /// restore had.
    fn perform_save(&self, inst: &Instruction, host: &mut dyn Host) -> bool {
        let mut snapshot_vm = self.vm.clone();
        if snapshot_vm.header.version <= 3 {
            let _ = apply_branch(&mut snapshot_vm, inst.branch, true);
        } else {
            let _ = apply_store(&mut snapshot_vm, inst.store_var, 2);
        }
        let image = quetzal::save_state(&snapshot_vm, &self.original_bytes);
        host.save(&image)
    }

    fn perform_restore(&mut self, host: &mut dyn Host) -> bool {
        match host.restore() {
            Some(bytes) => quetzal::restore_state(&mut self.vm, &bytes).is_ok(),
            None => false,
        }
    }

    fn do_call(
        &mut self,
        routine_packed: u16,
        args: &[u16],
        return_store: Option<u8>,
    ) -> Result<(), ZError> {
        if routine_packed == 0 {
            if let Some(store) = return_store {
                self.vm.write_variable(store, 0)?;
            }
            return Ok(());
        }
        let addr = self
            .vm
            .policy
            .unpack_routine(routine_packed, self.vm.header.routines_offset);
        let return_pc = self.vm.pc;
        self.vm.call(addr, args, return_store, return_pc)
    }
}

/// Core of [`Engine::store`], factored out so it can also be applied to a
/// cloned `Vm` that isn't attached to a live `Engine` (see
/// [`Engine::perform_save`]).
fn apply_store(vm: &mut Vm, store_var: Option<u8>, value: u16) -> Result<(), ZError> {
    if let Some(var) = store_var {
        vm.write_variable(var, value)?;
    }
    Ok(())
}

/// Core of [`Engine::branch`], factored out for the same reason as
/// [`apply_store`].
fn apply_branch(vm: &mut Vm, branch: Option<BranchInfo>, condition: bool) -> Result<(), ZError> {
    let Some(b) = branch else { return Ok(()) };
    if condition != b.on_true {
        return Ok(());
    }
    match b.offset {
        0 => vm.do_return(0),
        1 => vm.do_return(1),
        offset => {
            let target = (vm.pc as i64) + offset as i64 - 2;
            vm.pc = target as u32;
            Ok(())
        }
    }
}

fn pack_zchars(zchars: &[u8], word_count: usize) -> Vec<u16> {
    let mut padded = zchars.to_vec();
    while padded.len() < word_count * 3 {
        padded.push(5);
    }
    padded.truncate(word_count * 3);
    let mut words = Vec::with_capacity(word_count);
    for chunk in padded.chunks(3) {
        words.push(((chunk[0] as u16) << 10) | ((chunk[1] as u16) << 5) | chunk[2] as u16);
    }
    if let Some(last) = words.last_mut() {
        *last |= 0x8000;
    }
    words
}

// ---------------------------------------------------------------------
// 2OP
// ---------------------------------------------------------------------

fn op_je(e: &mut Engine, inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let matched = ops.len() > 1 && ops[1..].iter().any(|&v| v == ops[0]);
    e.branch(inst, matched)?;
    Ok(StepOutcome::Continue)
}

fn op_jl(e: &mut Engine, inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    e.branch(inst, rs(ops[0]) < rs(ops[1]))?;
    Ok(StepOutcome::Continue)
}

fn op_jg(e: &mut Engine, inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    e.branch(inst, rs(ops[0]) > rs(ops[1]))?;
    Ok(StepOutcome::Continue)
}

fn op_dec_chk(e: &mut Engine, inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let var = ops[0] as u8;
    let new_value = rs(e.vm.read_variable_in_place(var)?).wrapping_sub(1);
    e.vm.write_variable_in_place(var, new_value as u16)?;
    e.branch(inst, new_value < rs(ops[1]))?;
    Ok(StepOutcome::Continue)
}

fn op_inc_chk(e: &mut Engine, inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let var = ops[0] as u8;
    let new_value = rs(e.vm.read_variable_in_place(var)?).wrapping_add(1);
    e.vm.write_variable_in_place(var, new_value as u16)?;
    e.branch(inst, new_value > rs(ops[1]))?;
    Ok(StepOutcome::Continue)
}

fn op_jin(e: &mut Engine, inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let parent = e.objects.get_parent(&e.vm.memory, ops[0])?;
    e.branch(inst, parent == ops[1])?;
    Ok(StepOutcome::Continue)
}

fn op_test(e: &mut Engine, inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    e.branch(inst, (ops[0] & ops[1]) == ops[1])?;
    Ok(StepOutcome::Continue)
}

fn op_or(e: &mut Engine, inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    e.store(inst, ops[0] | ops[1])?;
    Ok(StepOutcome::Continue)
}

fn op_and(e: &mut Engine, inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    e.store(inst, ops[0] & ops[1])?;
    Ok(StepOutcome::Continue)
}

fn op_test_attr(e: &mut Engine, inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let set = e.objects.is_attr(&e.vm.memory, ops[0], ops[1])?;
    e.branch(inst, set)?;
    Ok(StepOutcome::Continue)
}

fn op_set_attr(e: &mut Engine, _inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    e.objects.set_attr(&mut e.vm.memory, ops[0], ops[1])?;
    Ok(StepOutcome::Continue)
}

fn op_clear_attr(e: &mut Engine, _inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    e.objects.clear_attr(&mut e.vm.memory, ops[0], ops[1])?;
    Ok(StepOutcome::Continue)
}

fn op_store(e: &mut Engine, _inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    e.vm.write_variable_in_place(ops[0] as u8, ops[1])?;
    Ok(StepOutcome::Continue)
}

fn op_insert_obj(e: &mut Engine, _inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    e.objects.insert_into(&mut e.vm.memory, ops[0], ops[1])?;
    Ok(StepOutcome::Continue)
}

fn op_loadw(e: &mut Engine, inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let value = e.vm.memory.loadw(ops[0] as u32 + ops[1] as u32 * 2)?;
    e.store(inst, value)?;
    Ok(StepOutcome::Continue)
}

fn op_loadb(e: &mut Engine, inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let value = e.vm.memory.loadb(ops[0] as u32 + ops[1] as u32)? as u16;
    e.store(inst, value)?;
    Ok(StepOutcome::Continue)
}

fn op_get_prop(e: &mut Engine, inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let value = e.objects.get_property(&e.vm.memory, ops[0], ops[1])?;
    e.store(inst, value)?;
    Ok(StepOutcome::Continue)
}

fn op_get_prop_addr(e: &mut Engine, inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let value = e.objects.get_property_address(&e.vm.memory, ops[0], ops[1])?;
    e.store(inst, value)?;
    Ok(StepOutcome::Continue)
}

fn op_get_next_prop(e: &mut Engine, inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let value = e.objects.get_next_property(&e.vm.memory, ops[0], ops[1])?;
    e.store(inst, value)?;
    Ok(StepOutcome::Continue)
}

fn op_add(e: &mut Engine, inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    e.store(inst, (rs(ops[0]).wrapping_add(rs(ops[1]))) as u16)?;
    Ok(StepOutcome::Continue)
}

fn op_sub(e: &mut Engine, inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    e.store(inst, (rs(ops[0]).wrapping_sub(rs(ops[1]))) as u16)?;
    Ok(StepOutcome::Continue)
}

fn op_mul(e: &mut Engine, inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    e.store(inst, (rs(ops[0]).wrapping_mul(rs(ops[1]))) as u16)?;
    Ok(StepOutcome::Continue)
}

fn op_div(e: &mut Engine, inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    if ops[1] == 0 {
        return Err(ZError::DivisionByZero);
    }
    e.store(inst, (rs(ops[0]).wrapping_div(rs(ops[1]))) as u16)?;
    Ok(StepOutcome::Continue)
}

fn op_mod(e: &mut Engine, inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    if ops[1] == 0 {
        return Err(ZError::DivisionByZero);
    }
    e.store(inst, (rs(ops[0]).wrapping_rem(rs(ops[1]))) as u16)?;
    Ok(StepOutcome::Continue)
}

fn op_call_2s(e: &mut Engine, inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    e.do_call(ops[0], &ops[1..2], inst.store_var)?;
    Ok(StepOutcome::Continue)
}

fn op_call_2n(e: &mut Engine, _inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    e.do_call(ops[0], &ops[1..2], None)?;
    Ok(StepOutcome::Continue)
}

fn op_set_colour(e: &mut Engine, _inst: &Instruction, ops: &[u16], h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    h.set_colour(ops[0] as u8, ops[1] as u8);
    let _ = e;
    Ok(StepOutcome::Continue)
}

fn op_throw(e: &mut Engine, _inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let target_depth = ops[1] as usize;
    while e.vm.call_depth() > target_depth {
        e.vm.call_stack.pop();
    }
    e.vm.do_return(ops[0])?;
    Ok(StepOutcome::Continue)
}

// ---------------------------------------------------------------------
// 1OP
// ---------------------------------------------------------------------

fn op_jz(e: &mut Engine, inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    e.branch(inst, ops[0] == 0)?;
    Ok(StepOutcome::Continue)
}

fn op_get_sibling(e: &mut Engine, inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let sibling = e.objects.get_sibling(&e.vm.memory, ops[0])?;
    e.store(inst, sibling)?;
    e.branch(inst, sibling != 0)?;
    Ok(StepOutcome::Continue)
}

fn op_get_child(e: &mut Engine, inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let child = e.objects.get_child(&e.vm.memory, ops[0])?;
    e.store(inst, child)?;
    e.branch(inst, child != 0)?;
    Ok(StepOutcome::Continue)
}

fn op_get_parent(e: &mut Engine, inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let parent = e.objects.get_parent(&e.vm.memory, ops[0])?;
    e.store(inst, parent)?;
    Ok(StepOutcome::Continue)
}

fn op_get_prop_len(e: &mut Engine, inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let len = e.objects.property_length_at(&e.vm.memory, ops[0])? as u16;
    e.store(inst, len)?;
    Ok(StepOutcome::Continue)
}

fn op_inc(e: &mut Engine, _inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let var = ops[0] as u8;
    let v = rs(e.vm.read_variable_in_place(var)?).wrapping_add(1);
    e.vm.write_variable_in_place(var, v as u16)?;
    Ok(StepOutcome::Continue)
}

fn op_dec(e: &mut Engine, _inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let var = ops[0] as u8;
    let v = rs(e.vm.read_variable_in_place(var)?).wrapping_sub(1);
    e.vm.write_variable_in_place(var, v as u16)?;
    Ok(StepOutcome::Continue)
}

fn op_print_addr(e: &mut Engine, _inst: &Instruction, ops: &[u16], h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let (text, _) = e.decode_string_at(ops[0] as u32)?;
    h.print(e.current_window, &text);
    Ok(StepOutcome::Continue)
}

fn op_call_1s(e: &mut Engine, inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    e.do_call(ops[0], &[], inst.store_var)?;
    Ok(StepOutcome::Continue)
}

fn op_remove_obj(e: &mut Engine, _inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    e.objects.remove_from_tree(&mut e.vm.memory, ops[0])?;
    Ok(StepOutcome::Continue)
}

fn op_print_obj(e: &mut Engine, _inst: &Instruction, ops: &[u16], h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let text = e.object_short_name(ops[0])?;
    h.print(e.current_window, &text);
    Ok(StepOutcome::Continue)
}

fn op_ret(e: &mut Engine, _inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    e.vm.do_return(ops[0])?;
    Ok(StepOutcome::Continue)
}

fn op_jump(e: &mut Engine, _inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let target = (e.vm.pc as i64) + rs(ops[0]) as i64 - 2;
    e.vm.pc = target as u32;
    Ok(StepOutcome::Continue)
}

fn op_print_paddr(e: &mut Engine, _inst: &Instruction, ops: &[u16], h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let addr = e.vm.policy.unpack_string(ops[0], e.vm.header.strings_offset);
    let (text, _) = e.decode_string_at(addr)?;
    h.print(e.current_window, &text);
    Ok(StepOutcome::Continue)
}

fn op_load(e: &mut Engine, inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let value = e.vm.read_variable_in_place(ops[0] as u8)?;
    e.store(inst, value)?;
    Ok(StepOutcome::Continue)
}

fn op_not_1op(e: &mut Engine, inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    e.store(inst, !ops[0])?;
    Ok(StepOutcome::Continue)
}

fn op_call_1n(e: &mut Engine, _inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    e.do_call(ops[0], &[], None)?;
    Ok(StepOutcome::Continue)
}

// ---------------------------------------------------------------------
// 0OP
// ---------------------------------------------------------------------

fn op_rtrue(e: &mut Engine, _inst: &Instruction, _ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    e.vm.do_return(1)?;
    Ok(StepOutcome::Continue)
}

fn op_rfalse(e: &mut Engine, _inst: &Instruction, _ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    e.vm.do_return(0)?;
    Ok(StepOutcome::Continue)
}

fn op_print(e: &mut Engine, _inst: &Instruction, _ops: &[u16], h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    e.print_literal(h)?;
    Ok(StepOutcome::Continue)
}

fn op_print_ret(e: &mut Engine, _inst: &Instruction, _ops: &[u16], h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    e.print_literal(h)?;
    h.print(e.current_window, "\n");
    e.vm.do_return(1)?;
    Ok(StepOutcome::Continue)
}

fn op_nop(_e: &mut Engine, _inst: &Instruction, _ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    Ok(StepOutcome::Continue)
}

fn op_save_0op(e: &mut Engine, inst: &Instruction, _ops: &[u16], h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let ok = e.perform_save(inst, h);
    if e.vm.header.version <= 3 {
        e.branch(inst, ok)?;
    } else {
        e.store(inst, ok as u16)?;
    }
    Ok(StepOutcome::Continue)
}

/// On success, `perform_restore` has already replaced `e.vm` wholesale with
/// the snapshot taken at save time — a snapshot that already has the save
/// instruction's own success result baked in. So there is nothing left to
/// store or branch here; only a failed restore reports through the current
/// instruction's own store/branch info, since the live VM was untouched.
fn op_restore_0op(e: &mut Engine, inst: &Instruction, _ops: &[u16], h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let ok = e.perform_restore(h);
    if !ok {
        if e.vm.header.version <= 3 {
            e.branch(inst, false)?;
        } else {
            e.store(inst, 0)?;
        }
    }
    Ok(StepOutcome::Continue)
}

fn op_restart(e: &mut Engine, _inst: &Instruction, _ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let bytes = e.original_bytes.clone();
    let rand = ZRand::new_uniform();
    *e = Engine::new(bytes, rand)?;
    Ok(StepOutcome::Continue)
}

fn op_ret_popped(e: &mut Engine, _inst: &Instruction, _ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let value = e.vm.pop()?;
    e.vm.do_return(value)?;
    Ok(StepOutcome::Continue)
}

fn op_pop_or_catch(e: &mut Engine, inst: &Instruction, _ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    if e.vm.header.version >= 5 {
        let depth = e.vm.call_depth() as u16;
        e.store(inst, depth)?;
    } else {
        e.vm.pop()?;
    }
    Ok(StepOutcome::Continue)
}

fn op_quit(_e: &mut Engine, _inst: &Instruction, _ops: &[u16], h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    h.quit();
    Ok(StepOutcome::Quit)
}

fn op_new_line(e: &mut Engine, _inst: &Instruction, _ops: &[u16], h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    h.print(e.current_window, "\n");
    Ok(StepOutcome::Continue)
}

fn op_show_status(e: &mut Engine, _inst: &Instruction, _ops: &[u16], h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let globals = e.vm.header.global_variables;
    let location = e.vm.memory.read_global(globals, 16)?;
    let name = e.object_short_name(location).unwrap_or_default();
    let g1 = rs(e.vm.memory.read_global(globals, 17)?);
    let g2 = e.vm.memory.read_global(globals, 18)?;
    let is_time = g2 > 0 && g2 <= 24;
    h.status(&name, g1, is_time);
    Ok(StepOutcome::Continue)
}

fn op_verify(e: &mut Engine, inst: &Instruction, _ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let ok = e.checksum_matches();
    e.branch(inst, ok)?;
    Ok(StepOutcome::Continue)
}

fn op_piracy(e: &mut Engine, inst: &Instruction, _ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    e.branch(inst, true)?;
    Ok(StepOutcome::Continue)
}

// ---------------------------------------------------------------------
// VAR
// ---------------------------------------------------------------------

fn op_call_vs(e: &mut Engine, inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    e.do_call(ops[0], &ops[1..], inst.store_var)?;
    Ok(StepOutcome::Continue)
}

fn op_storew(e: &mut Engine, _inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    e.vm.memory.storew(ops[0] as u32 + ops[1] as u32 * 2, ops[2])?;
    Ok(StepOutcome::Continue)
}

fn op_storeb(e: &mut Engine, _inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    e.vm.memory.storeb(ops[0] as u32 + ops[1] as u32, ops[2] as u8)?;
    Ok(StepOutcome::Continue)
}

fn op_put_prop(e: &mut Engine, _inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    e.objects.set_property(&mut e.vm.memory, ops[0], ops[1], ops[2])?;
    Ok(StepOutcome::Continue)
}

fn op_read(e: &mut Engine, inst: &Instruction, ops: &[u16], h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let text_buffer = ops[0] as u32;
    let declared = e.vm.memory.loadb(text_buffer)? as usize;
    // v1-4: byte 0 holds (max typeable - 1); v5+: byte 0 holds the max directly.
    let max_typeable = if e.vm.header.version >= 5 { declared } else { declared + 1 };
    let timeout = ops.get(2).copied().unwrap_or(0);

    let reply = h.read_line(max_typeable, "", timeout);
    let line = match reply {
        ReadLineReply::Line(s) => s,
        ReadLineReply::TimedOut => String::new(),
    };
    let lower: String = line.chars().map(|c| c.to_ascii_lowercase()).collect();
    let written = lower.len().min(max_typeable);

    let text_start = if e.vm.header.version >= 5 { text_buffer + 2 } else { text_buffer + 1 };
    for (i, ch) in lower.bytes().enumerate().take(written) {
        e.vm.memory.storeb(text_start + i as u32, ch)?;
    }
    if e.vm.header.version >= 5 {
        e.vm.memory.storeb(text_buffer + 1, written as u8)?;
    } else {
        e.vm.memory.storeb(text_start + written as u32, 0)?;
    }

    if let Some(&parse_buffer) = ops.get(1) {
        if parse_buffer != 0 {
            let separators = dictionary::read_separators(&e.vm.memory, e.vm.header.dictionary)?;
            let tokens = dictionary::tokenise(&lower, &separators);
            let max_words = e.vm.memory.loadb(parse_buffer as u32)? as usize;
            let count = tokens.len().min(max_words);
            e.vm.memory.storeb(parse_buffer as u32 + 1, count as u8)?;
            for (i, tok) in tokens.iter().take(count).enumerate() {
                let addr = dictionary::lookup(&e.vm.memory, e.vm.header.dictionary, &tok.text, e.vm.header.version)?;
                let base = parse_buffer as u32 + 2 + i as u32 * 4;
                e.vm.memory.storew(base, addr)?;
                e.vm.memory.storeb(base + 2, tok.text.len() as u8)?;
                let offset_in_buffer = if e.vm.header.version >= 5 { 2 } else { 1 };
                e.vm.memory.storeb(base + 3, (tok.offset + offset_in_buffer) as u8)?;
            }
        }
    }

    if e.vm.header.version >= 5 {
        if let Some(store) = inst.store_var {
            e.vm.write_variable(store, 13)?;
        }
    }
    Ok(StepOutcome::Continue)
}

fn op_print_char(e: &mut Engine, _inst: &Instruction, ops: &[u16], h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let ch = zscii::zchar_to_char(ops[0])?;
    h.print(e.current_window, &ch.to_string());
    Ok(StepOutcome::Continue)
}

fn op_print_num(e: &mut Engine, _inst: &Instruction, ops: &[u16], h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    h.print(e.current_window, &rs(ops[0]).to_string());
    Ok(StepOutcome::Continue)
}

fn op_random(e: &mut Engine, inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let value = e.rand.random_opcode(rs(ops[0]));
    e.store(inst, value)?;
    Ok(StepOutcome::Continue)
}

fn op_push(e: &mut Engine, _inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    e.vm.push(ops[0]);
    Ok(StepOutcome::Continue)
}

fn op_pull(e: &mut Engine, _inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let value = e.vm.pop()?;
    e.vm.write_variable(ops[0] as u8, value)?;
    Ok(StepOutcome::Continue)
}

fn op_split_window(e: &mut Engine, _inst: &Instruction, ops: &[u16], h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    h.split_window(ops[0]);
    let _ = e;
    Ok(StepOutcome::Continue)
}

fn op_set_window(e: &mut Engine, _inst: &Instruction, ops: &[u16], h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    e.current_window = if ops[0] == 0 { WindowId::Lower } else { WindowId::Upper };
    h.set_window(e.current_window);
    Ok(StepOutcome::Continue)
}

fn op_call_vs2(e: &mut Engine, inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    e.do_call(ops[0], &ops[1..], inst.store_var)?;
    Ok(StepOutcome::Continue)
}

fn op_erase_window(e: &mut Engine, _inst: &Instruction, ops: &[u16], h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let window = if ops[0] == 1 { WindowId::Upper } else { WindowId::Lower };
    h.clear_screen(window);
    let _ = e;
    Ok(StepOutcome::Continue)
}

fn op_erase_line(_e: &mut Engine, _inst: &Instruction, _ops: &[u16], h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    h.erase_line();
    Ok(StepOutcome::Continue)
}

fn op_set_cursor(_e: &mut Engine, _inst: &Instruction, ops: &[u16], h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    h.set_cursor(ops[0], ops[1]);
    Ok(StepOutcome::Continue)
}

fn op_get_cursor(e: &mut Engine, _inst: &Instruction, ops: &[u16], h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let (row, col) = h.get_cursor();
    e.vm.memory.storew(ops[0] as u32, row)?;
    e.vm.memory.storew(ops[0] as u32 + 2, col)?;
    Ok(StepOutcome::Continue)
}

fn op_set_text_style(_e: &mut Engine, _inst: &Instruction, ops: &[u16], h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let style = TextStyle {
        reverse: ops[0] & 0x01 != 0,
        bold: ops[0] & 0x02 != 0,
        italic: ops[0] & 0x04 != 0,
        fixed_pitch: ops[0] & 0x08 != 0,
    };
    h.set_text_style(style);
    Ok(StepOutcome::Continue)
}

fn op_buffer_mode(_e: &mut Engine, _inst: &Instruction, _ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    Ok(StepOutcome::Continue)
}

fn op_output_stream(_e: &mut Engine, _inst: &Instruction, _ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    Ok(StepOutcome::Continue)
}

fn op_input_stream(_e: &mut Engine, _inst: &Instruction, _ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    Ok(StepOutcome::Continue)
}

fn op_sound_effect(_e: &mut Engine, _inst: &Instruction, ops: &[u16], h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    h.sound_effect(ops[0], ops.get(1).copied().unwrap_or(0), ops.get(2).copied().unwrap_or(0));
    Ok(StepOutcome::Continue)
}

fn op_read_char(e: &mut Engine, inst: &Instruction, ops: &[u16], h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let timeout = ops.get(1).copied().unwrap_or(0);
    let reply = h.read_char(timeout);
    let code = match reply {
        ReadCharReply::Char(c) => c as u16,
        ReadCharReply::TimedOut => 0,
    };
    e.store(inst, code)?;
    Ok(StepOutcome::Continue)
}

fn op_scan_table(e: &mut Engine, inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let value = ops[0];
    let table = ops[1] as u32;
    let len = ops[2];
    let form = ops.get(3).copied().unwrap_or(0x82) as u8;
    let entry_len = (form & 0x7F).max(1) as u32;
    let is_word = form & 0x80 != 0;

    let mut found_addr = 0u16;
    for i in 0..len as u32 {
        let addr = table + i * entry_len;
        let entry_value = if is_word { e.vm.memory.loadw(addr)? } else { e.vm.memory.loadb(addr)? as u16 };
        if entry_value == value {
            found_addr = addr as u16;
            break;
        }
    }
    e.store(inst, found_addr)?;
    e.branch(inst, found_addr != 0)?;
    Ok(StepOutcome::Continue)
}

fn op_not_var(e: &mut Engine, inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    e.store(inst, !ops[0])?;
    Ok(StepOutcome::Continue)
}

fn op_call_vn(e: &mut Engine, _inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    e.do_call(ops[0], &ops[1..], None)?;
    Ok(StepOutcome::Continue)
}

fn op_call_vn2(e: &mut Engine, _inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    e.do_call(ops[0], &ops[1..], None)?;
    Ok(StepOutcome::Continue)
}

fn op_tokenise(e: &mut Engine, _inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let text_buffer = ops[0] as u32;
    let parse_buffer = ops[1] as u32;
    let dict_addr = ops.get(2).copied().filter(|&d| d != 0).unwrap_or(e.vm.header.dictionary);

    let len = e.vm.memory.loadb(text_buffer + 1)? as usize;
    let text_start = if e.vm.header.version >= 5 { text_buffer + 2 } else { text_buffer + 1 };
    let mut text = String::new();
    for i in 0..len {
        text.push(e.vm.memory.loadb(text_start + i as u32)? as char);
    }

    let separators = dictionary::read_separators(&e.vm.memory, dict_addr)?;
    let tokens = dictionary::tokenise(&text, &separators);
    let max_words = e.vm.memory.loadb(parse_buffer)? as usize;
    let count = tokens.len().min(max_words);
    e.vm.memory.storeb(parse_buffer + 1, count as u8)?;
    for (i, tok) in tokens.iter().take(count).enumerate() {
        let addr = dictionary::lookup(&e.vm.memory, dict_addr, &tok.text, e.vm.header.version)?;
        let base = parse_buffer + 2 + i as u32 * 4;
        e.vm.memory.storew(base, addr)?;
        e.vm.memory.storeb(base + 2, tok.text.len() as u8)?;
        let offset_in_buffer = if e.vm.header.version >= 5 { 2 } else { 1 };
        e.vm.memory.storeb(base + 3, (tok.offset + offset_in_buffer) as u8)?;
    }
    Ok(StepOutcome::Continue)
}

fn op_encode_text(e: &mut Engine, _inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let zscii_buffer = ops[0] as u32;
    let length = ops[1] as usize;
    let from = ops[2] as u32;
    let coded_buffer = ops[3] as u32;

    let mut text = String::new();
    for i in 0..length {
        text.push(e.vm.memory.loadb(zscii_buffer + from + i as u32)? as char);
    }
    let num_words = if e.vm.header.version <= 3 { 2 } else { 3 };
    let zchars = zscii::to_zchar_list(&text, num_words * 3);
    let words = pack_zchars(&zchars, num_words);
    for (i, w) in words.iter().enumerate() {
        e.vm.memory.storew(coded_buffer + i as u32 * 2, *w)?;
    }
    Ok(StepOutcome::Continue)
}

fn op_copy_table(e: &mut Engine, _inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let first = ops[0] as u32;
    let second = ops[1];
    let size = rs(ops[2]);

    if second == 0 {
        for i in 0..size.unsigned_abs() as u32 {
            e.vm.memory.storeb(first + i, 0)?;
        }
        return Ok(StepOutcome::Continue);
    }
    let second = second as u32;
    let len = size.unsigned_abs() as u32;
    if size > 0 && second > first && second < first + len {
        for i in (0..len).rev() {
            let b = e.vm.memory.loadb(first + i)?;
            e.vm.memory.storeb(second + i, b)?;
        }
    } else {
        for i in 0..len {
            let b = e.vm.memory.loadb(first + i)?;
            e.vm.memory.storeb(second + i, b)?;
        }
    }
    Ok(StepOutcome::Continue)
}

fn op_print_table(e: &mut Engine, _inst: &Instruction, ops: &[u16], h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let table = ops[0] as u32;
    let width = ops[1];
    let height = ops.get(2).copied().unwrap_or(1);
    let skip = ops.get(3).copied().unwrap_or(0);

    let mut out = String::new();
    for row in 0..height {
        if row > 0 {
            out.push('\n');
        }
        let row_start = table + row as u32 * (width as u32 + skip as u32);
        for col in 0..width {
            out.push(e.vm.memory.loadb(row_start + col as u32)? as char);
        }
    }
    h.print(e.current_window, &out);
    Ok(StepOutcome::Continue)
}

fn op_check_arg_count(e: &mut Engine, inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let num_args = e.vm.current_frame()?.num_args as u16;
    e.branch(inst, ops[0] <= num_args)?;
    Ok(StepOutcome::Continue)
}

// ---------------------------------------------------------------------
// EXT
// ---------------------------------------------------------------------

fn op_ext_save(e: &mut Engine, inst: &Instruction, _ops: &[u16], h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let ok = e.perform_save(inst, h);
    e.store(inst, ok as u16)?;
    Ok(StepOutcome::Continue)
}

/// A successful restore has already swapped in the snapshot VM, which
/// already carries the "2" result for the original `save` instruction's
/// destination variable. Only report failure here, into this instruction's
/// own destination.
fn op_ext_restore(e: &mut Engine, inst: &Instruction, _ops: &[u16], h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let ok = e.perform_restore(h);
    if !ok {
        e.store(inst, 0)?;
    }
    Ok(StepOutcome::Continue)
}

fn op_log_shift(e: &mut Engine, inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let places = rs(ops[1]);
    let value = if places >= 0 {
        ops[0].wrapping_shl(places as u32)
    } else {
        ops[0].wrapping_shr((-places) as u32)
    };
    e.store(inst, value)?;
    Ok(StepOutcome::Continue)
}

fn op_art_shift(e: &mut Engine, inst: &Instruction, ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let places = rs(ops[1]);
    let value = if places >= 0 {
        (rs(ops[0])).wrapping_shl(places as u32)
    } else {
        (rs(ops[0])).wrapping_shr((-places) as u32)
    };
    e.store(inst, value as u16)?;
    Ok(StepOutcome::Continue)
}

fn op_set_font(e: &mut Engine, inst: &Instruction, ops: &[u16], h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    let prev = h.set_font(ops[0] as u8);
    e.store(inst, prev as u16)?;
    Ok(StepOutcome::Continue)
}

fn op_save_undo(e: &mut Engine, inst: &Instruction, _ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    e.store(inst, (-1i16) as u16)?;
    Ok(StepOutcome::Continue)
}

fn op_restore_undo(e: &mut Engine, inst: &Instruction, _ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    e.store(inst, (-1i16) as u16)?;
    Ok(StepOutcome::Continue)
}

fn op_print_unicode(e: &mut Engine, _inst: &Instruction, ops: &[u16], h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    if let Some(ch) = char::from_u32(ops[0] as u32) {
        h.print(e.current_window, &ch.to_string());
    }
    Ok(StepOutcome::Continue)
}

fn op_check_unicode(e: &mut Engine, inst: &Instruction, _ops: &[u16], _h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    e.store(inst, 0x03)?;
    Ok(StepOutcome::Continue)
}

fn build_main_table() -> [Option<OpcodeFn>; MAIN_TABLE_SIZE] {
    let mut t: [Option<OpcodeFn>; MAIN_TABLE_SIZE] = [None; MAIN_TABLE_SIZE];
    t[main_key(OperandCount::Op2, 0x01)] = Some(op_je);
    t[main_key(OperandCount::Op2, 0x02)] = Some(op_jl);
    t[main_key(OperandCount::Op2, 0x03)] = Some(op_jg);
    t[main_key(OperandCount::Op2, 0x04)] = Some(op_dec_chk);
    t[main_key(OperandCount::Op2, 0x05)] = Some(op_inc_chk);
    t[main_key(OperandCount::Op2, 0x06)] = Some(op_jin);
    t[main_key(OperandCount::Op2, 0x07)] = Some(op_test);
    t[main_key(OperandCount::Op2, 0x08)] = Some(op_or);
    t[main_key(OperandCount::Op2, 0x09)] = Some(op_and);
    t[main_key(OperandCount::Op2, 0x0A)] = Some(op_test_attr);
    t[main_key(OperandCount::Op2, 0x0B)] = Some(op_set_attr);
    t[main_key(OperandCount::Op2, 0x0C)] = Some(op_clear_attr);
    t[main_key(OperandCount::Op2, 0x0D)] = Some(op_store);
    t[main_key(OperandCount::Op2, 0x0E)] = Some(op_insert_obj);
    t[main_key(OperandCount::Op2, 0x0F)] = Some(op_loadw);
    t[main_key(OperandCount::Op2, 0x10)] = Some(op_loadb);
    t[main_key(OperandCount::Op2, 0x11)] = Some(op_get_prop);
    t[main_key(OperandCount::Op2, 0x12)] = Some(op_get_prop_addr);
    t[main_key(OperandCount::Op2, 0x13)] = Some(op_get_next_prop);
    t[main_key(OperandCount::Op2, 0x14)] = Some(op_add);
    t[main_key(OperandCount::Op2, 0x15)] = Some(op_sub);
    t[main_key(OperandCount::Op2, 0x16)] = Some(op_mul);
    t[main_key(OperandCount::Op2, 0x17)] = Some(op_div);
    t[main_key(OperandCount::Op2, 0x18)] = Some(op_mod);
    t[main_key(OperandCount::Op2, 0x19)] = Some(op_call_2s);
    t[main_key(OperandCount::Op2, 0x1A)] = Some(op_call_2n);
    t[main_key(OperandCount::Op2, 0x1B)] = Some(op_set_colour);
    t[main_key(OperandCount::Op2, 0x1C)] = Some(op_throw);

    t[main_key(OperandCount::Op1, 0x00)] = Some(op_jz);
    t[main_key(OperandCount::Op1, 0x01)] = Some(op_get_sibling);
    t[main_key(OperandCount::Op1, 0x02)] = Some(op_get_child);
    t[main_key(OperandCount::Op1, 0x03)] = Some(op_get_parent);
    t[main_key(OperandCount::Op1, 0x04)] = Some(op_get_prop_len);
    t[main_key(OperandCount::Op1, 0x05)] = Some(op_inc);
    t[main_key(OperandCount::Op1, 0x06)] = Some(op_dec);
    t[main_key(OperandCount::Op1, 0x07)] = Some(op_print_addr);
    t[main_key(OperandCount::Op1, 0x08)] = Some(op_call_1s);
    t[main_key(OperandCount::Op1, 0x09)] = Some(op_remove_obj);
    t[main_key(OperandCount::Op1, 0x0A)] = Some(op_print_obj);
    t[main_key(OperandCount::Op1, 0x0B)] = Some(op_ret);
    t[main_key(OperandCount::Op1, 0x0C)] = Some(op_jump);
    t[main_key(OperandCount::Op1, 0x0D)] = Some(op_print_paddr);
    t[main_key(OperandCount::Op1, 0x0E)] = Some(op_load);
    // 0x0F is version-dependent (not v1-4 / call_1n v5+); route both through
    // small shims that check the story version at call time.
    t[main_key(OperandCount::Op1, 0x0F)] = Some(op_not_or_call_1n);

    t[main_key(OperandCount::Op0, 0x00)] = Some(op_rtrue);
    t[main_key(OperandCount::Op0, 0x01)] = Some(op_rfalse);
    t[main_key(OperandCount::Op0, 0x02)] = Some(op_print);
    t[main_key(OperandCount::Op0, 0x03)] = Some(op_print_ret);
    t[main_key(OperandCount::Op0, 0x04)] = Some(op_nop);
    t[main_key(OperandCount::Op0, 0x05)] = Some(op_save_0op);
    t[main_key(OperandCount::Op0, 0x06)] = Some(op_restore_0op);
    t[main_key(OperandCount::Op0, 0x07)] = Some(op_restart);
    t[main_key(OperandCount::Op0, 0x08)] = Some(op_ret_popped);
    t[main_key(OperandCount::Op0, 0x09)] = Some(op_pop_or_catch);
    t[main_key(OperandCount::Op0, 0x0A)] = Some(op_quit);
    t[main_key(OperandCount::Op0, 0x0B)] = Some(op_new_line);
    t[main_key(OperandCount::Op0, 0x0C)] = Some(op_show_status);
    t[main_key(OperandCount::Op0, 0x0D)] = Some(op_verify);
    t[main_key(OperandCount::Op0, 0x0F)] = Some(op_piracy);

    t[main_key(OperandCount::Var, 0x00)] = Some(op_call_vs);
    t[main_key(OperandCount::Var, 0x01)] = Some(op_storew);
    t[main_key(OperandCount::Var, 0x02)] = Some(op_storeb);
    t[main_key(OperandCount::Var, 0x03)] = Some(op_put_prop);
    t[main_key(OperandCount::Var, 0x04)] = Some(op_read);
    t[main_key(OperandCount::Var, 0x05)] = Some(op_print_char);
    t[main_key(OperandCount::Var, 0x06)] = Some(op_print_num);
    t[main_key(OperandCount::Var, 0x07)] = Some(op_random);
    t[main_key(OperandCount::Var, 0x08)] = Some(op_push);
    t[main_key(OperandCount::Var, 0x09)] = Some(op_pull);
    t[main_key(OperandCount::Var, 0x0A)] = Some(op_split_window);
    t[main_key(OperandCount::Var, 0x0B)] = Some(op_set_window);
    t[main_key(OperandCount::Var, 0x0C)] = Some(op_call_vs2);
    t[main_key(OperandCount::Var, 0x0D)] = Some(op_erase_window);
    t[main_key(OperandCount::Var, 0x0E)] = Some(op_erase_line);
    t[main_key(OperandCount::Var, 0x0F)] = Some(op_set_cursor);
    t[main_key(OperandCount::Var, 0x10)] = Some(op_get_cursor);
    t[main_key(OperandCount::Var, 0x11)] = Some(op_set_text_style);
    t[main_key(OperandCount::Var, 0x12)] = Some(op_buffer_mode);
    t[main_key(OperandCount::Var, 0x13)] = Some(op_output_stream);
    t[main_key(OperandCount::Var, 0x14)] = Some(op_input_stream);
    t[main_key(OperandCount::Var, 0x15)] = Some(op_sound_effect);
    t[main_key(OperandCount::Var, 0x16)] = Some(op_read_char);
    t[main_key(OperandCount::Var, 0x17)] = Some(op_scan_table);
    t[main_key(OperandCount::Var, 0x18)] = Some(op_not_var);
    t[main_key(OperandCount::Var, 0x19)] = Some(op_call_vn);
    t[main_key(OperandCount::Var, 0x1A)] = Some(op_call_vn2);
    t[main_key(OperandCount::Var, 0x1B)] = Some(op_tokenise);
    t[main_key(OperandCount::Var, 0x1C)] = Some(op_encode_text);
    t[main_key(OperandCount::Var, 0x1D)] = Some(op_copy_table);
    t[main_key(OperandCount::Var, 0x1E)] = Some(op_print_table);
    t[main_key(OperandCount::Var, 0x1F)] = Some(op_check_arg_count);
    t
}

/// `0x0F` in the 1OP space is `not` for v1-4 and `call_1n` for v5+ — the
/// Standard reassigns the opcode rather than adding a new one.
fn op_not_or_call_1n(e: &mut Engine, inst: &Instruction, ops: &[u16], h: &mut dyn Host) -> Result<StepOutcome, ZError> {
    if e.vm.header.version >= 5 {
        op_call_1n(e, inst, ops, h)
    } else {
        op_not_1op(e, inst, ops, h)
    }
}

fn build_ext_table() -> [Option<OpcodeFn>; EXT_TABLE_SIZE] {
    let mut t: [Option<OpcodeFn>; EXT_TABLE_SIZE] = [None; EXT_TABLE_SIZE];
    t[0x00] = Some(op_ext_save);
    t[0x01] = Some(op_ext_restore);
    t[0x02] = Some(op_log_shift);
    t[0x03] = Some(op_art_shift);
    t[0x04] = Some(op_set_font);
    t[0x09] = Some(op_save_undo);
    t[0x0A] = Some(op_restore_undo);
    t[0x0B] = Some(op_print_unicode);
    t[0x0C] = Some(op_check_unicode);
    t
}
