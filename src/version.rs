//! Per-version policy: address packing, object table geometry, and which
//! opcodes/behaviors a story version gets.
//!
//! Grounded on the version branches scattered through `zobject_v3.rs` /
//! `zobject_v4.rs` (object record size, attribute/property counts) and
//! `vm.rs` (locals initialisation), collapsed into a single value type
//! instead of per-version inheritance.

use crate::error::ZError;

/// Object-record geometry and packing rules that vary by story version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionPolicy {
    pub version: u8,
}

impl VersionPolicy {
    pub fn for_version(version: u8) -> Result<Self, ZError> {
        match version {
            1 | 3 | 4 | 5 | 7 | 8 => Ok(VersionPolicy { version }),
            6 => Err(ZError::UnsupportedVersion { version }),
            other => Err(ZError::UnsupportedVersion { version: other }),
        }
    }

    /// Object record size in bytes.
    pub fn object_record_size(&self) -> usize {
        if self.version <= 3 {
            9
        } else {
            14
        }
    }

    /// Number of attribute bits.
    pub fn attribute_count(&self) -> u16 {
        if self.version <= 3 {
            32
        } else {
            48
        }
    }

    /// Number of property-defaults table entries.
    pub fn property_defaults_count(&self) -> u16 {
        if self.version <= 3 {
            31
        } else {
            63
        }
    }

    /// Byte width of the parent/sibling/child fields.
    pub fn object_field_width(&self) -> usize {
        if self.version <= 3 {
            1
        } else {
            2
        }
    }

    /// Unpack a packed routine address into a byte address (§4.8).
    pub fn unpack_routine(&self, packed: u16, routines_offset: u16) -> u32 {
        match self.version {
            1 | 3 => 2 * packed as u32,
            4 | 5 => 4 * packed as u32,
            7 => 4 * packed as u32 + 8 * routines_offset as u32,
            8 => 8 * packed as u32,
            _ => 4 * packed as u32,
        }
    }

    /// Unpack a packed string address into a byte address (§4.8).
    pub fn unpack_string(&self, packed: u16, strings_offset: u16) -> u32 {
        match self.version {
            1 | 3 => 2 * packed as u32,
            4 | 5 => 4 * packed as u32,
            7 => 4 * packed as u32 + 8 * strings_offset as u32,
            8 => 8 * packed as u32,
            _ => 4 * packed as u32,
        }
    }

    /// Whether locals are initialised from the bytes following the routine
    /// header (v1-4) or always zeroed (v5+).
    pub fn locals_initialised_from_memory(&self) -> bool {
        self.version <= 4
    }

    /// Maximum story file size in bytes.
    pub fn max_file_len(&self) -> usize {
        match self.version {
            1 | 3 => 128 * 1024,
            4 | 5 => 256 * 1024,
            7 | 8 => 512 * 1024,
            _ => 128 * 1024,
        }
    }

    /// Whether the extended (EXT) opcode form and the v5+ opcode set are
    /// available.
    pub fn has_extended_opcodes(&self) -> bool {
        self.version >= 5
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn rejects_v6() {
        assert_eq!(
            VersionPolicy::for_version(6),
            Err(ZError::UnsupportedVersion { version: 6 })
        );
    }

    #[test]
    fn rejects_unknown_version() {
        assert!(VersionPolicy::for_version(9).is_err());
    }

    #[test]
    fn v3_vs_v4_geometry() {
        let v3 = VersionPolicy::for_version(3).unwrap();
        let v4 = VersionPolicy::for_version(4).unwrap();
        assert_eq!(v3.object_record_size(), 9);
        assert_eq!(v4.object_record_size(), 14);
        assert_eq!(v3.property_defaults_count(), 31);
        assert_eq!(v4.property_defaults_count(), 63);
    }

    #[test]
    fn unpack_formulas() {
        let v3 = VersionPolicy::for_version(3).unwrap();
        let v5 = VersionPolicy::for_version(5).unwrap();
        let v7 = VersionPolicy::for_version(7).unwrap();
        let v8 = VersionPolicy::for_version(8).unwrap();
        assert_eq!(v3.unpack_routine(0x100, 0), 0x200);
        assert_eq!(v5.unpack_routine(0x100, 0), 0x400);
        assert_eq!(v7.unpack_routine(0x100, 0x10), 0x400 + 0x80);
        assert_eq!(v8.unpack_routine(0x100, 0), 0x800);
    }

    #[test]
    fn locals_init_policy() {
        assert!(VersionPolicy::for_version(4).unwrap().locals_initialised_from_memory());
        assert!(!VersionPolicy::for_version(5).unwrap().locals_initialised_from_memory());
    }
}
