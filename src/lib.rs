//! A Z-Machine interpreter core: memory map, ZSCII text codec, object
//! tree, instruction decoder, and the fetch-decode-dispatch engine, for
//! story file versions 1, 3, 4, 5, 7, and 8.

pub mod config;
pub mod dictionary;
pub mod engine;
pub mod error;
pub mod header;
pub mod host;
pub mod instruction;
pub mod memory;
pub mod object;
pub mod quetzal;
pub mod version;
pub mod vm;
pub mod zrand;
pub mod zscii;
