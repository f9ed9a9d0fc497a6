//! Command-line surface.

use std::str::FromStr;

use clap::Parser;

use crate::mbc::CartridgeType;
use crate::plan::FixSpec;

#[derive(Parser, Debug)]
#[command(version, about = "Patch and validate Game Boy ROM headers")]
pub struct Args {
    /// Set the Game Boy Color-only flag ($0143) to $C0.
    /// Takes precedence over `-c`.
    #[arg(short = 'C', long)]
    pub color_only: bool,

    /// Set the Game Boy Color-compatible flag ($0143) to $80.
    #[arg(short = 'c', long)]
    pub color_compatible: bool,

    /// Fix certain header values that the Game Boy checks for correctness.
    /// Alternatively, intentionally trash these values by writing their
    /// binary inverse instead. The argument is a string of any of:
    ///
    /// `l`: Fix the Nintendo logo ($0104-$0133).
    ///
    /// `L`: Trash the Nintendo logo.
    ///
    /// `h`: Fix the header checksum ($014D).
    ///
    /// `H`: Trash the header checksum.
    ///
    /// `g`: Fix the global checksum ($014E-$014F).
    ///
    /// `G`: Trash the global checksum.
    #[arg(short, long, value_name = "SPEC", value_parser = FixSpec::from_str)]
    pub fix_spec: Option<FixSpec>,

    /// Set the game ID string ($013F-$0142) to a given string.
    /// If it's longer than 4 chars, it will be truncated, and a warning
    /// emitted.
    #[arg(short = 'i', long, value_name = "ID")]
    pub game_id: Option<String>,

    /// Set the non-Japanese region flag ($014A) to $01.
    #[arg(short = 'j', long)]
    pub non_japanese: bool,

    /// Set the new licensee string ($0144-$0145) to a given string.
    /// If it's longer than 2 chars, it will be truncated, and a warning
    /// emitted.
    #[arg(short = 'k', long, value_name = "CODE")]
    pub new_licensee: Option<String>,

    /// Set the old licensee code ($014B) to a given value from 0 to 255.
    /// This value is deprecated and should be set to $33 in all new
    /// software.
    #[arg(short = 'l', long, value_name = "BYTE", value_parser = parse_byte)]
    pub old_licensee: Option<u8>,

    /// Set the MBC type ($0147) to a given value from 0 to 255.
    ///
    /// This value may also be an MBC name such as "MBC3+TIMER+RAM+BATTERY";
    /// pass `help` to list the accepted names. Any amount of whitespace is
    /// allowed around plus signs, underscores count as spaces, and matching
    /// ignores case.
    #[arg(short = 'm', long, value_name = "TYPE", value_parser = parse_mbc)]
    pub mbc_type: Option<CartridgeType>,

    /// Set the ROM version ($014C) to a given value from 0 to 255.
    #[arg(short = 'n', long, value_name = "BYTE", value_parser = parse_byte)]
    pub rom_version: Option<u8>,

    /// Pad the ROM image to a valid size with a given pad value from 0 to
    /// 255. The ROM is padded up to the next power of two of 16 KiB banks,
    /// and the size byte ($0148) is set to match. A pad value of $FF is
    /// recommended, as it speeds up writing the ROM to flash chips.
    #[arg(short, long, value_name = "BYTE", value_parser = parse_byte)]
    pub pad_value: Option<u8>,

    /// Set the RAM size ($0149) to a given value from 0 to 255.
    #[arg(short, long, value_name = "BYTE", value_parser = parse_byte)]
    pub ram_size: Option<u8>,

    /// Set the SGB flag ($0146) to $03. The SGB ignores this flag unless the
    /// old licensee code is $33; a warning is emitted if `-l` says
    /// otherwise.
    #[arg(short, long)]
    pub sgb_compatible: bool,

    /// Set the title string ($0134-$0143) to a given string. If the title is
    /// longer than the maximum length, it will be truncated, and a warning
    /// emitted. The maximum length is 11 characters if the game ID (`-i`) is
    /// specified, 15 characters if a color flag (`-c` or `-C`) is specified
    /// but the game ID is not, and 16 characters otherwise.
    #[arg(short, long)]
    pub title: Option<String>,

    /// Equivalent to `-f lhg`: fix the logo and both checksums.
    #[arg(short, long)]
    pub validate: bool,

    /// ROM files to patch in place. `-`, or no file at all, patches standard
    /// input to standard output instead.
    #[arg(value_name = "FILE")]
    pub files: Vec<String>,
}

/// Parses a byte value written in decimal, `0x` hex, or `$` hex.
pub fn parse_byte(input: &str) -> Result<u8, String> {
    let (digits, radix) = if let Some(hex) = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        (hex, 16)
    } else if let Some(hex) = input.strip_prefix('$') {
        (hex, 16)
    } else {
        (input, 10)
    };
    u8::from_str_radix(digits, radix).map_err(|err| err.to_string())
}

fn parse_mbc(input: &str) -> Result<CartridgeType, String> {
    if input.eq_ignore_ascii_case("help") {
        print_accepted_mbc_types();
        std::process::exit(0);
    }
    input.parse().map_err(|err| format!("{err}"))
}

fn print_accepted_mbc_types() {
    eprintln!("Accepted MBC types:");
    eprintln!("\tROM ($00) [aka ROM_ONLY]");
    eprintln!("\tMBC1 ($01), MBC1+RAM ($02), MBC1+RAM+BATTERY ($03)");
    eprintln!("\tMBC2 ($05), MBC2+BATTERY ($06)");
    eprintln!("\tROM+RAM ($08) [deprecated], ROM+RAM+BATTERY ($09) [deprecated]");
    eprintln!("\tMMM01 ($0B), MMM01+RAM ($0C), MMM01+RAM+BATTERY ($0D)");
    eprintln!("\tMBC3+TIMER+BATTERY ($0F), MBC3+TIMER+RAM+BATTERY ($10)");
    eprintln!("\tMBC3 ($11), MBC3+RAM ($12), MBC3+RAM+BATTERY ($13)");
    eprintln!("\tMBC5 ($19), MBC5+RAM ($1A), MBC5+RAM+BATTERY ($1B)");
    eprintln!("\tMBC5+RUMBLE ($1C), MBC5+RUMBLE+RAM ($1D), MBC5+RUMBLE+RAM+BATTERY ($1E)");
    eprintln!("\tMBC6 ($20)");
    eprintln!("\tMBC7+SENSOR+RUMBLE+RAM+BATTERY ($22)");
    eprintln!("\tPOCKET_CAMERA ($FC)");
    eprintln!("\tBANDAI_TAMA5 ($FD)");
    eprintln!("\tHUC3 ($FE)");
    eprintln!("\tHUC1+RAM+BATTERY ($FF)");
}
