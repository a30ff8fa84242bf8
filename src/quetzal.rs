//! Quetzal save-game encoding: a FORM/IFZS IFF container wrapping an IFhd,
//! CMem, and Stks chunk.
//!
//! Grounded on `quetzal/iff.rs`'s FORM/IFZS chunk framing (4-byte type plus
//! big-endian `u32` size, even-padded) and `quetzal/chunks.rs`'s IFhd/Stks
//! layouts, with `quetzal/compressed_memory.rs`'s XOR-RLE compression kept
//! near-verbatim. That version wrote straight to `std::fs::File`; here the
//! whole image is built and parsed in memory, since persistence is the
//! `Host`'s job ([`crate::host::Host::save`]/`restore`), not this module's.

use crate::error::ZError;
use crate::vm::{CallFrame, Vm};

const MAX_LOCALS: usize = 15;

fn compress_memory(current: &[u8], original: &[u8]) -> Vec<u8> {
    let mut compressed = Vec::new();
    let mut i = 0;
    while i < current.len() {
        let xor_byte = current[i] ^ original[i];
        if xor_byte == 0 {
            let start = i;
            while i < current.len() && (current[i] ^ original[i]) == 0 {
                i += 1;
            }
            let mut remaining = i - start;
            while remaining > 256 {
                compressed.push(0);
                compressed.push(255);
                remaining -= 256;
            }
            if remaining > 0 {
                compressed.push(0);
                compressed.push((remaining - 1) as u8);
            }
        } else {
            compressed.push(xor_byte);
            i += 1;
        }
    }
    compressed
}

fn decompress_memory(compressed: &[u8], original: &[u8]) -> Result<Vec<u8>, ZError> {
    let mismatch = |reason: &str| ZError::QuetzalMismatch {
        reason: reason.to_string(),
    };
    let mut out = Vec::with_capacity(original.len());
    let mut ci = 0;
    let mut oi = 0;
    while ci < compressed.len() && oi < original.len() {
        let byte = compressed[ci];
        ci += 1;
        if byte == 0 {
            if ci >= compressed.len() {
                return Err(mismatch("incomplete CMem RLE run"));
            }
            let run_length = compressed[ci] as usize + 1;
            ci += 1;
            for _ in 0..run_length {
                if oi >= original.len() {
                    return Err(mismatch("CMem run extends past dynamic memory"));
                }
                out.push(original[oi]);
                oi += 1;
            }
        } else {
            if oi >= original.len() {
                return Err(mismatch("CMem data extends past dynamic memory"));
            }
            out.push(original[oi] ^ byte);
            oi += 1;
        }
    }
    out.extend_from_slice(&original[oi..]);
    if out.len() != original.len() {
        return Err(mismatch("CMem decompressed to the wrong size"));
    }
    Ok(out)
}

fn write_chunk(out: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(chunk_type);
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(data);
    if data.len() % 2 == 1 {
        out.push(0);
    }
}

fn ifhd_bytes(vm: &Vm) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(13);
    bytes.extend_from_slice(&vm.header.release.to_be_bytes());
    bytes.extend_from_slice(vm.header.serial.as_bytes());
    bytes.extend_from_slice(&vm.header.checksum_file.to_be_bytes());
    let pc = vm.pc.to_be_bytes();
    bytes.extend_from_slice(&pc[1..4]);
    bytes
}

fn stks_bytes(vm: &Vm) -> Vec<u8> {
    let mut data = Vec::new();
    for (idx, frame) in vm.call_stack.iter().enumerate() {
        let pc_bytes = frame.return_pc.to_be_bytes();
        data.extend_from_slice(&pc_bytes[1..4]);

        let mut flags = frame.num_locals & 0x0F;
        if frame.return_store.is_none() {
            flags |= 0x10;
        }
        data.push(flags);
        data.push(frame.return_store.unwrap_or(0));

        let supplied_mask: u8 = if frame.num_args >= 7 {
            0x7F
        } else {
            (1u8 << frame.num_args) - 1
        };
        data.push(supplied_mask);

        let stack_end = vm
            .call_stack
            .get(idx + 1)
            .map(|f| f.stack_base)
            .unwrap_or(vm.stack.len());
        let stack_size = stack_end.saturating_sub(frame.stack_base);
        data.extend_from_slice(&(stack_size as u16).to_be_bytes());

        for i in 0..frame.num_locals as usize {
            data.extend_from_slice(&frame.locals[i].to_be_bytes());
        }
        for i in frame.stack_base..stack_end {
            data.extend_from_slice(&vm.stack[i].to_be_bytes());
        }
    }
    data
}

fn parse_stks(data: &[u8]) -> Result<(Vec<CallFrame>, Vec<u16>), ZError> {
    let mismatch = |reason: &str| ZError::QuetzalMismatch {
        reason: reason.to_string(),
    };
    let mut frames = Vec::new();
    let mut stack = Vec::new();
    let mut offset = 0;
    while offset < data.len() {
        if offset + 6 > data.len() {
            return Err(mismatch("truncated Stks frame header"));
        }
        let return_pc = ((data[offset] as u32) << 16)
            | ((data[offset + 1] as u32) << 8)
            | data[offset + 2] as u32;
        offset += 3;

        let flags = data[offset];
        offset += 1;
        let num_locals = flags & 0x0F;
        let has_store = flags & 0x10 == 0;

        let store_byte = data[offset];
        offset += 1;
        let return_store = if has_store { Some(store_byte) } else { None };

        let supplied_mask = data[offset];
        offset += 1;
        let num_args = supplied_mask.count_ones() as u8;

        if offset + 2 > data.len() {
            return Err(mismatch("truncated Stks eval-stack count"));
        }
        let stack_count = u16::from_be_bytes([data[offset], data[offset + 1]]) as usize;
        offset += 2;

        let mut locals = [0u16; MAX_LOCALS];
        if num_locals as usize > MAX_LOCALS || offset + num_locals as usize * 2 > data.len() {
            return Err(mismatch("truncated Stks locals"));
        }
        for slot in locals.iter_mut().take(num_locals as usize) {
            *slot = u16::from_be_bytes([data[offset], data[offset + 1]]);
            offset += 2;
        }

        let stack_base = stack.len();
        if offset + stack_count * 2 > data.len() {
            return Err(mismatch("truncated Stks eval-stack values"));
        }
        for _ in 0..stack_count {
            stack.push(u16::from_be_bytes([data[offset], data[offset + 1]]));
            offset += 2;
        }

        frames.push(CallFrame {
            return_pc,
            return_store,
            num_locals,
            locals,
            stack_base,
            num_args,
        });
    }
    Ok((frames, stack))
}

/// Serialize `vm`'s current state into a Quetzal (FORM/IFZS) byte image,
/// diffing dynamic memory against `original_bytes`.
pub fn save_state(vm: &Vm, original_bytes: &[u8]) -> Vec<u8> {
    let dynamic_size = vm.memory.dynamic_size();
    let current_dynamic = &vm.memory.as_bytes()[..dynamic_size];
    let original_dynamic = &original_bytes[..dynamic_size.min(original_bytes.len())];
    let cmem = compress_memory(current_dynamic, original_dynamic);

    let mut body = Vec::new();
    body.extend_from_slice(b"IFZS");
    write_chunk(&mut body, b"IFhd", &ifhd_bytes(vm));
    write_chunk(&mut body, b"CMem", &cmem);
    write_chunk(&mut body, b"Stks", &stks_bytes(vm));

    let mut out = Vec::with_capacity(body.len() + 8);
    out.extend_from_slice(b"FORM");
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(&body);
    out
}

/// Parse a Quetzal byte image and apply it to `vm` in place: dynamic memory,
/// the program counter, and both stacks are replaced; static/high memory is
/// untouched, since it is never saved.
pub fn restore_state(vm: &mut Vm, bytes: &[u8]) -> Result<(), ZError> {
    let mismatch = |reason: &str| ZError::QuetzalMismatch {
        reason: reason.to_string(),
    };
    if bytes.len() < 12 || &bytes[0..4] != b"FORM" || &bytes[8..12] != b"IFZS" {
        return Err(mismatch("not a Quetzal FORM/IFZS image"));
    }
    let total_size = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    let body_end = (8 + total_size).min(bytes.len());
    let mut offset = 12;

    let mut ifhd: Option<&[u8]> = None;
    let mut cmem: Option<&[u8]> = None;
    let mut stks: Option<&[u8]> = None;

    while offset + 8 <= body_end {
        let chunk_type = &bytes[offset..offset + 4];
        let size = u32::from_be_bytes([
            bytes[offset + 4],
            bytes[offset + 5],
            bytes[offset + 6],
            bytes[offset + 7],
        ]) as usize;
        let data_start = offset + 8;
        let data_end = data_start
            .checked_add(size)
            .ok_or_else(|| mismatch("chunk size overflow"))?;
        if data_end > bytes.len() {
            return Err(mismatch("chunk runs past end of image"));
        }
        let data = &bytes[data_start..data_end];
        match chunk_type {
            b"IFhd" => ifhd = Some(data),
            b"CMem" => cmem = Some(data),
            b"Stks" => stks = Some(data),
            _ => {}
        }
        offset = data_end + (size % 2);
    }

    let ifhd = ifhd.ok_or_else(|| mismatch("missing IFhd chunk"))?;
    if ifhd.len() < 13 {
        return Err(mismatch("IFhd chunk too small"));
    }
    let checksum = u16::from_be_bytes([ifhd[8], ifhd[9]]);
    if checksum != vm.header.checksum_file {
        return Err(mismatch("save is for a different story file"));
    }
    let restored_pc = ((ifhd[10] as u32) << 16) | ((ifhd[11] as u32) << 8) | ifhd[12] as u32;

    let cmem = cmem.ok_or_else(|| mismatch("missing CMem chunk"))?;
    let dynamic_size = vm.memory.dynamic_size();
    let original_dynamic = vm.memory.as_bytes()[..dynamic_size].to_vec();
    let restored_dynamic = decompress_memory(cmem, &original_dynamic)?;
    vm.memory.dynamic_region_mut().copy_from_slice(&restored_dynamic);

    let stks = stks.ok_or_else(|| mismatch("missing Stks chunk"))?;
    let (frames, stack) = parse_stks(stks)?;
    if frames.is_empty() {
        return Err(mismatch("Stks chunk has no frames"));
    }
    vm.call_stack = frames;
    vm.stack = stack;
    vm.pc = restored_pc;

    Ok(())
}
