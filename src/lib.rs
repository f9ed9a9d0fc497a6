//! Post-link patcher for Game Boy ROM images.
//!
//! Edits the fixed cartridge header at `[$0100..$0150]`, optionally pads the
//! image up to a power-of-two number of 16 KiB banks, and recomputes the two
//! integrity checksums the boot ROM validates. Works in place on a seekable
//! file, or streams standard input to standard output.

pub mod cli;
pub mod diag;
pub mod header;
pub mod mbc;
pub mod plan;
pub mod process;
