//! The ROM image processor.
//!
//! A ROM is patched in one linear pass per file: read bank 0, apply the
//! header edits, settle the image size (padding), then the header checksum,
//! then the global checksum, and finally write everything back. The order
//! matters: the size byte is covered by the header checksum, and the header
//! checksum is covered by the global checksum.
//!
//! Two modes share that skeleton. In-place mode works on one seekable file
//! and rewrites only what changed; stream mode copies stdin to stdout and
//! must buffer the banks past bank 0 in memory, because the global checksum
//! lands inside bank 0, which has to be written out first.

use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};

use thiserror::Error;

use crate::header::{self, offset, BANK_SIZE, HEADER_END, LOGO};
use crate::plan::{FixSpec, Model, PatchPlan};

/// A ROM cannot address more banks than this.
const MAX_BANKS: u64 = 0x1_0000;

/// A fatal per-file condition. The file is abandoned; the run continues.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("read failed: {0}")]
    Read(io::Error),
    #[error("write failed: {0}")]
    Write(io::Error),
    #[error("seek failed: {0}")]
    Seek(io::Error),
    #[error("file too short, the header needs at least 336 ($150) bytes")]
    TooShort,
    #[error("ROM has more than 65536 banks")]
    TooManyBanks,
}

/// Patches a seekable ROM image in place.
///
/// The cursor must sit at the start of the file, and `size` is the
/// authoritative file length. Unless padding is requested only the header
/// area is rewritten; with padding, the pad tail is appended as well.
pub fn patch_file<F: Read + Write + Seek>(
    plan: &PatchPlan,
    file: &mut F,
    size: u64,
) -> Result<(), ProcessError> {
    let mut rom0 = [0u8; BANK_SIZE];
    let mut rom0_len = read_fully(file, &mut rom0).map_err(ProcessError::Read)?;
    if rom0_len < HEADER_END {
        return Err(ProcessError::TooShort);
    }
    apply_header(plan, &mut rom0);

    if size >= MAX_BANKS * BANK_SIZE as u64 {
        return Err(ProcessError::TooManyBanks);
    }
    let nb_banks = size.div_ceil(BANK_SIZE as u64);
    let romx_len = size.saturating_sub(BANK_SIZE as u64);

    let mut global = 0u16;
    let mut pad_len = 0;
    if let Some(pad) = plan.pad_value {
        (rom0_len, pad_len) = pad_image(pad, &mut rom0, rom0_len, nb_banks, romx_len, &mut global);
    }

    fix_header_sum(plan, &mut rom0);

    if plan
        .fix_spec
        .intersects(FixSpec::FIX_GLOBAL_SUM | FixSpec::TRASH_GLOBAL_SUM)
    {
        // The format defines the checksum with its own two bytes as zero.
        rom0[offset::GLOBAL_CHECKSUM] = 0;
        rom0[offset::GLOBAL_CHECKSUM + 1] = 0;
        global = header::global_sum(global, &rom0[..rom0_len]);
        // The cursor sits just past bank 0; sweep the rest of the image.
        let mut bank = [0u8; BANK_SIZE];
        loop {
            let read = read_fully(file, &mut bank).map_err(ProcessError::Read)?;
            global = header::global_sum(global, &bank[..read]);
            if read < BANK_SIZE {
                break;
            }
        }
        store_global_sum(plan, &mut rom0, global);
    }

    file.seek(SeekFrom::Start(0)).map_err(ProcessError::Seek)?;
    if let Some(pad) = plan.pad_value {
        file.write_all(&rom0[..rom0_len])
            .map_err(ProcessError::Write)?;
        file.seek(SeekFrom::End(0)).map_err(ProcessError::Seek)?;
        write_padding(file, pad, pad_len)?;
    } else {
        // Minimal in-place edit: only the header area is rewritten.
        file.write_all(&rom0[..HEADER_END])
            .map_err(ProcessError::Write)?;
    }
    Ok(())
}

/// Patches a ROM image streamed from `input` to `output`.
pub fn patch_stream<R: Read, W: Write>(
    plan: &PatchPlan,
    input: &mut R,
    output: &mut W,
) -> Result<(), ProcessError> {
    let mut rom0 = [0u8; BANK_SIZE];
    let mut rom0_len = read_fully(input, &mut rom0).map_err(ProcessError::Read)?;
    if rom0_len < HEADER_END {
        return Err(ProcessError::TooShort);
    }
    apply_header(plan, &mut rom0);

    // Buffer the upper banks, summing them as they arrive.
    let mut global = 0u16;
    let mut romx = Vec::new();
    let mut nb_banks: u64 = 1;
    loop {
        let old_len = romx.len();
        romx.resize(old_len + BANK_SIZE, 0);
        let read = read_fully(input, &mut romx[old_len..]).map_err(ProcessError::Read)?;
        romx.truncate(old_len + read);
        global = header::global_sum(global, &romx[old_len..]);
        if read == 0 {
            break;
        }
        nb_banks += 1;
        if nb_banks > MAX_BANKS {
            return Err(ProcessError::TooManyBanks);
        }
        if read < BANK_SIZE {
            break;
        }
    }
    let romx_len = romx.len() as u64;

    let mut pad_len = 0;
    if let Some(pad) = plan.pad_value {
        (rom0_len, pad_len) = pad_image(pad, &mut rom0, rom0_len, nb_banks, romx_len, &mut global);
    }

    fix_header_sum(plan, &mut rom0);

    if plan
        .fix_spec
        .intersects(FixSpec::FIX_GLOBAL_SUM | FixSpec::TRASH_GLOBAL_SUM)
    {
        rom0[offset::GLOBAL_CHECKSUM] = 0;
        rom0[offset::GLOBAL_CHECKSUM + 1] = 0;
        global = header::global_sum(global, &rom0[..rom0_len]);
        store_global_sum(plan, &mut rom0, global);
    }

    output
        .write_all(&rom0[..rom0_len])
        .map_err(ProcessError::Write)?;
    output.write_all(&romx).map_err(ProcessError::Write)?;
    if let Some(pad) = plan.pad_value {
        write_padding(output, pad, pad_len)?;
    }
    output.flush().map_err(ProcessError::Write)
}

/// Applies the requested header edits to the bank-0 buffer.
fn apply_header(plan: &PatchPlan, rom0: &mut [u8]) {
    if plan.fix_spec.contains(FixSpec::FIX_LOGO) {
        rom0[offset::LOGO..offset::LOGO + LOGO.len()].copy_from_slice(&LOGO);
    } else if plan.fix_spec.contains(FixSpec::TRASH_LOGO) {
        for (byte, logo) in rom0[offset::LOGO..].iter_mut().zip(&LOGO) {
            *byte = !logo;
        }
    }
    if let Some(title) = &plan.title {
        rom0[offset::TITLE..offset::TITLE + title.len()].copy_from_slice(title);
    }
    if let Some(id) = &plan.game_id {
        rom0[offset::GAME_ID..offset::GAME_ID + id.len()].copy_from_slice(id);
    }
    match plan.model {
        Model::Dmg => {}
        Model::Both => rom0[offset::CGB_FLAG] = 0x80,
        Model::Cgb => rom0[offset::CGB_FLAG] = 0xc0,
    }
    if let Some(licensee) = &plan.new_licensee {
        rom0[offset::NEW_LICENSEE..offset::NEW_LICENSEE + licensee.len()].copy_from_slice(licensee);
    }
    if plan.sgb {
        rom0[offset::SGB_FLAG] = 0x03;
    }
    if let Some(kind) = plan.cartridge_type {
        rom0[offset::CARTRIDGE_TYPE] = kind.code();
    }
    if let Some(size) = plan.ram_size {
        rom0[offset::RAM_SIZE] = size;
    }
    if !plan.japanese {
        rom0[offset::DESTINATION] = 0x01;
    }
    if let Some(code) = plan.old_licensee {
        rom0[offset::OLD_LICENSEE] = code;
    }
    if let Some(version) = plan.rom_version {
        rom0[offset::ROM_VERSION] = version;
    }
}

/// Settles the padded size of the image: rounds the bank count up to a power
/// of two (at least 2), pads a lone bank 0 up to a full bank in its buffer,
/// stores the size byte, and folds the pad tail into the running checksum.
///
/// Returns the (possibly grown) bank-0 length and the pad tail length.
fn pad_image(
    pad: u8,
    rom0: &mut [u8; BANK_SIZE],
    mut rom0_len: usize,
    mut nb_banks: u64,
    romx_len: u64,
    global: &mut u16,
) -> (usize, u64) {
    if nb_banks == 1 {
        rom0[rom0_len..].fill(pad);
        rom0_len = BANK_SIZE;
        nb_banks = 2;
    }
    let nb_banks = nb_banks.next_power_of_two();
    rom0[offset::ROM_SIZE] = (nb_banks / 2).trailing_zeros() as u8;
    let pad_len = (nb_banks - 1) * BANK_SIZE as u64 - romx_len;
    // Each pad byte contributes `pad`; modulo 2^16 that is a product.
    *global = global.wrapping_add(u16::from(pad).wrapping_mul(pad_len as u16));
    (rom0_len, pad_len)
}

fn fix_header_sum(plan: &PatchPlan, rom0: &mut [u8]) {
    if plan
        .fix_spec
        .intersects(FixSpec::FIX_HEADER_SUM | FixSpec::TRASH_HEADER_SUM)
    {
        let mut sum = header::header_checksum(rom0);
        if !plan.fix_spec.contains(FixSpec::FIX_HEADER_SUM) {
            sum = !sum;
        }
        rom0[offset::HEADER_CHECKSUM] = sum;
    }
}

fn store_global_sum(plan: &PatchPlan, rom0: &mut [u8], mut global: u16) {
    if !plan.fix_spec.contains(FixSpec::FIX_GLOBAL_SUM) {
        global = !global;
    }
    rom0[offset::GLOBAL_CHECKSUM..offset::GLOBAL_CHECKSUM + 2]
        .copy_from_slice(&global.to_be_bytes());
}

/// Reads until `buf` is full or the input is exhausted, retrying on
/// interruption and accumulating short reads. Returns the byte count.
fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(read) => total += read,
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(total)
}

/// Writes `len` bytes of `pad`, one bank at a time.
fn write_padding<W: Write>(output: &mut W, pad: u8, mut len: u64) -> Result<(), ProcessError> {
    let bank = [pad; BANK_SIZE];
    while len > 0 {
        let chunk = len.min(BANK_SIZE as u64) as usize;
        output
            .write_all(&bank[..chunk])
            .map_err(ProcessError::Write)?;
        len -= chunk as u64;
    }
    Ok(())
}
