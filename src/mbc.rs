//! Cartridge-type descriptors.
//!
//! The byte at `$0147` names the memory bank controller and any extra
//! hardware on the cartridge. Users spell it either as a number or as a
//! mapper family plus `+`-separated features (`"MBC3+TIMER+RAM+BATTERY"`);
//! this module owns the closed set of defined bytes and the descriptor
//! parser.

use std::fmt;
use std::num::IntErrorKind;
use std::str::FromStr;

use bitflags::bitflags;
use parse_display::Display;
use thiserror::Error;

bitflags! {
    /// Extra hardware named alongside a mapper family.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Features: u8 {
        const RAM = 1 << 0;
        const BATTERY = 1 << 1;
        const TIMER = 1 << 2;
        const RUMBLE = 1 << 3;
        const SENSOR = 1 << 4;
    }
}

/// Every cartridge-type byte the header format defines.
///
/// Discriminants are the header byte values.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Mbc {
    #[display("ROM")]
    Rom = 0x00,
    #[display("MBC1")]
    Mbc1 = 0x01,
    #[display("MBC1+RAM")]
    Mbc1Ram = 0x02,
    #[display("MBC1+RAM+BATTERY")]
    Mbc1RamBattery = 0x03,
    #[display("MBC2")]
    Mbc2 = 0x05,
    #[display("MBC2+BATTERY")]
    Mbc2Battery = 0x06,
    #[display("ROM+RAM")]
    RomRam = 0x08,
    #[display("ROM+RAM+BATTERY")]
    RomRamBattery = 0x09,
    #[display("MMM01")]
    Mmm01 = 0x0b,
    #[display("MMM01+RAM")]
    Mmm01Ram = 0x0c,
    #[display("MMM01+RAM+BATTERY")]
    Mmm01RamBattery = 0x0d,
    #[display("MBC3+TIMER+BATTERY")]
    Mbc3TimerBattery = 0x0f,
    #[display("MBC3+TIMER+RAM+BATTERY")]
    Mbc3TimerRamBattery = 0x10,
    #[display("MBC3")]
    Mbc3 = 0x11,
    #[display("MBC3+RAM")]
    Mbc3Ram = 0x12,
    #[display("MBC3+RAM+BATTERY")]
    Mbc3RamBattery = 0x13,
    #[display("MBC5")]
    Mbc5 = 0x19,
    #[display("MBC5+RAM")]
    Mbc5Ram = 0x1a,
    #[display("MBC5+RAM+BATTERY")]
    Mbc5RamBattery = 0x1b,
    #[display("MBC5+RUMBLE")]
    Mbc5Rumble = 0x1c,
    #[display("MBC5+RUMBLE+RAM")]
    Mbc5RumbleRam = 0x1d,
    #[display("MBC5+RUMBLE+RAM+BATTERY")]
    Mbc5RumbleRamBattery = 0x1e,
    #[display("MBC6")]
    Mbc6 = 0x20,
    #[display("MBC7+SENSOR+RUMBLE+RAM+BATTERY")]
    Mbc7SensorRumbleRamBattery = 0x22,
    #[display("POCKET CAMERA")]
    PocketCamera = 0xfc,
    #[display("BANDAI TAMA5")]
    BandaiTama5 = 0xfd,
    #[display("HUC3")]
    HuC3 = 0xfe,
    #[display("HUC1+RAM+BATTERY")]
    HuC1RamBattery = 0xff,
}

impl Mbc {
    /// The header byte for this cartridge type.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Looks a header byte up in the closed set.
    pub fn from_code(code: u8) -> Option<Self> {
        use Mbc::*;
        Some(match code {
            0x00 => Rom,
            0x01 => Mbc1,
            0x02 => Mbc1Ram,
            0x03 => Mbc1RamBattery,
            0x05 => Mbc2,
            0x06 => Mbc2Battery,
            0x08 => RomRam,
            0x09 => RomRamBattery,
            0x0b => Mmm01,
            0x0c => Mmm01Ram,
            0x0d => Mmm01RamBattery,
            0x0f => Mbc3TimerBattery,
            0x10 => Mbc3TimerRamBattery,
            0x11 => Mbc3,
            0x12 => Mbc3Ram,
            0x13 => Mbc3RamBattery,
            0x19 => Mbc5,
            0x1a => Mbc5Ram,
            0x1b => Mbc5RamBattery,
            0x1c => Mbc5Rumble,
            0x1d => Mbc5RumbleRam,
            0x1e => Mbc5RumbleRamBattery,
            0x20 => Mbc6,
            0x22 => Mbc7SensorRumbleRamBattery,
            0xfc => PocketCamera,
            0xfd => BandaiTama5,
            0xfe => HuC3,
            0xff => HuC1RamBattery,
            _ => return None,
        })
    }

    /// Whether this cartridge type exposes external RAM.
    ///
    /// MBC6 and BANDAI TAMA5 do carry RAM on real hardware, but the size
    /// cross-check does not model them; they answer `false`.
    pub fn has_ram(self) -> bool {
        use Mbc::*;
        matches!(
            self,
            Mbc1Ram
                | Mbc1RamBattery
                | RomRam
                | RomRamBattery
                | Mmm01Ram
                | Mmm01RamBattery
                | Mbc3TimerRamBattery
                | Mbc3Ram
                | Mbc3RamBattery
                | Mbc5Ram
                | Mbc5RamBattery
                | Mbc5RumbleRam
                | Mbc5RumbleRamBattery
                | Mbc7SensorRumbleRamBattery
                | PocketCamera
                | HuC3
                | HuC1RamBattery
        )
    }
}

/// A resolved cartridge-type byte.
///
/// Numeric descriptors may name a byte outside the defined set; those are
/// kept verbatim and written to the header unchecked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartridgeType {
    Known(Mbc),
    Unknown(u8),
}

impl CartridgeType {
    /// The byte to store at `$0147`.
    pub fn code(self) -> u8 {
        match self {
            Self::Known(mbc) => mbc.code(),
            Self::Unknown(code) => code,
        }
    }

    /// Whether the type is known to expose external RAM. Bytes outside the
    /// defined set answer `false`.
    pub fn has_ram(self) -> bool {
        match self {
            Self::Known(mbc) => mbc.has_ram(),
            Self::Unknown(_) => false,
        }
    }
}

impl fmt::Display for CartridgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(mbc) => mbc.fmt(f),
            Self::Unknown(code) => write!(f, "${code:02X}"),
        }
    }
}

/// Why a cartridge-type descriptor was rejected.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ParseMbcError {
    /// Not a number and not a known mapper family with features.
    #[error("unknown cartridge type descriptor")]
    BadSyntax,
    /// The feature set is not one this mapper family ships with.
    #[error("feature combination not accepted for this mapper")]
    IncompatibleFeatures,
    /// A numeric descriptor that does not fit the header byte.
    #[error("cartridge type value must be between 0 and 255")]
    OutOfRange,
}

impl FromStr for CartridgeType {
    type Err = ParseMbcError;

    fn from_str(descriptor: &str) -> Result<Self, Self::Err> {
        // Matching ignores case, and underscores count as spaces.
        let normalized: String = descriptor
            .chars()
            .map(|c| if c == '_' { ' ' } else { c.to_ascii_uppercase() })
            .collect();
        let normalized = normalized.trim();
        if normalized.is_empty() {
            return Err(ParseMbcError::BadSyntax);
        }
        if normalized.starts_with('$') || normalized.starts_with(|c: char| c.is_ascii_digit()) {
            return parse_numeric(normalized);
        }
        let (family, rest) = parse_family(normalized)?;
        let features = parse_features(rest)?;
        family.resolve(features).map(CartridgeType::Known)
    }
}

/// Numeric descriptors carry no feature validation; any byte is accepted.
fn parse_numeric(descriptor: &str) -> Result<CartridgeType, ParseMbcError> {
    let (digits, radix) = if let Some(hex) = descriptor.strip_prefix("0X") {
        (hex, 16)
    } else if let Some(hex) = descriptor.strip_prefix('$') {
        (hex, 16)
    } else {
        (descriptor, 10)
    };
    let value = match u32::from_str_radix(digits, radix) {
        Ok(value) => value,
        Err(err) if matches!(err.kind(), IntErrorKind::PosOverflow) => {
            return Err(ParseMbcError::OutOfRange)
        }
        Err(_) => return Err(ParseMbcError::BadSyntax),
    };
    let code = u8::try_from(value).map_err(|_| ParseMbcError::OutOfRange)?;
    Ok(match Mbc::from_code(code) {
        Some(mbc) => CartridgeType::Known(mbc),
        None => CartridgeType::Unknown(code),
    })
}

/// Mapper families a descriptor may start with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Rom,
    Mbc1,
    Mbc2,
    Mbc3,
    Mbc5,
    Mbc6,
    Mbc7,
    Mmm01,
    PocketCamera,
    Tama5,
    HuC1,
    HuC3,
}

/// Strips leading whitespace, requiring at least one character of it.
fn strip_gap(s: &str) -> Option<&str> {
    let trimmed = s.trim_start();
    (trimmed.len() < s.len()).then_some(trimmed)
}

fn parse_family(descriptor: &str) -> Result<(Family, &str), ParseMbcError> {
    if let Some(rest) = descriptor.strip_prefix("MMM01") {
        return Ok((Family::Mmm01, rest));
    }
    if let Some(rest) = descriptor.strip_prefix("MBC") {
        let family = match rest.chars().next() {
            Some('1') => Family::Mbc1,
            Some('2') => Family::Mbc2,
            Some('3') => Family::Mbc3,
            Some('5') => Family::Mbc5,
            Some('6') => Family::Mbc6,
            Some('7') => Family::Mbc7,
            _ => return Err(ParseMbcError::BadSyntax),
        };
        return Ok((family, &rest[1..]));
    }
    if let Some(rest) = descriptor.strip_prefix("POCKET") {
        return match strip_gap(rest).and_then(|rest| rest.strip_prefix("CAMERA")) {
            Some(rest) => Ok((Family::PocketCamera, rest)),
            None => Err(ParseMbcError::BadSyntax),
        };
    }
    // "BANDAI" is an optional prefix of "TAMA5".
    let (bandai, descriptor) = match descriptor.strip_prefix("BANDAI") {
        Some(rest) => (true, strip_gap(rest).ok_or(ParseMbcError::BadSyntax)?),
        None => (false, descriptor),
    };
    if let Some(rest) = descriptor.strip_prefix("TAMA5") {
        return Ok((Family::Tama5, rest));
    }
    if bandai {
        return Err(ParseMbcError::BadSyntax);
    }
    if let Some(rest) = descriptor.strip_prefix("HUC") {
        let family = match rest.chars().next() {
            Some('1') => Family::HuC1,
            Some('3') => Family::HuC3,
            _ => return Err(ParseMbcError::BadSyntax),
        };
        return Ok((family, &rest[1..]));
    }
    if let Some(rest) = descriptor.strip_prefix("ROM") {
        // An optional "ONLY" changes nothing.
        if let Some(rest) = strip_gap(rest).and_then(|rest| rest.strip_prefix("ONLY")) {
            return Ok((Family::Rom, rest));
        }
        return Ok((Family::Rom, rest));
    }
    Err(ParseMbcError::BadSyntax)
}

const FEATURE_NAMES: [(&str, Features); 5] = [
    ("RAM", Features::RAM),
    ("BATTERY", Features::BATTERY),
    ("TIMER", Features::TIMER),
    ("RUMBLE", Features::RUMBLE),
    ("SENSOR", Features::SENSOR),
];

/// Parses a `("+" feature)*` tail; whitespace is allowed around each `+`.
/// Anything left over after the last feature is a syntax error.
fn parse_features(mut rest: &str) -> Result<Features, ParseMbcError> {
    let mut features = Features::empty();
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return Ok(features);
        }
        rest = rest
            .strip_prefix('+')
            .ok_or(ParseMbcError::BadSyntax)?
            .trim_start();
        let (name, feature) = FEATURE_NAMES
            .iter()
            .find(|(name, _)| rest.starts_with(name))
            .ok_or(ParseMbcError::BadSyntax)?;
        features |= *feature;
        rest = &rest[name.len()..];
    }
}

impl Family {
    /// The feature combinations each family ships with. Order of features in
    /// the descriptor is free; set equality decides.
    fn resolve(self, features: Features) -> Result<Mbc, ParseMbcError> {
        const NONE: Features = Features::empty();
        const RAM: Features = Features::RAM;
        const BATTERY: Features = Features::BATTERY;
        const RUMBLE: Features = Features::RUMBLE;
        const RAM_BATTERY: Features = RAM.union(BATTERY);
        const TIMER_BATTERY: Features = Features::TIMER.union(BATTERY);
        const TIMER_RAM_BATTERY: Features = TIMER_BATTERY.union(RAM);
        const RUMBLE_RAM: Features = RUMBLE.union(RAM);
        const RUMBLE_RAM_BATTERY: Features = RUMBLE_RAM.union(BATTERY);
        const SENSOR_RUMBLE_RAM_BATTERY: Features = Features::SENSOR.union(RUMBLE_RAM_BATTERY);

        let table: &[(Features, Mbc)] = match self {
            Family::Rom => &[
                (NONE, Mbc::Rom),
                (RAM, Mbc::RomRam),
                (RAM_BATTERY, Mbc::RomRamBattery),
            ],
            Family::Mbc1 => &[
                (NONE, Mbc::Mbc1),
                (RAM, Mbc::Mbc1Ram),
                (RAM_BATTERY, Mbc::Mbc1RamBattery),
            ],
            Family::Mbc2 => &[(NONE, Mbc::Mbc2), (BATTERY, Mbc::Mbc2Battery)],
            Family::Mmm01 => &[
                (NONE, Mbc::Mmm01),
                (RAM, Mbc::Mmm01Ram),
                (RAM_BATTERY, Mbc::Mmm01RamBattery),
            ],
            Family::Mbc3 => &[
                (NONE, Mbc::Mbc3),
                (RAM, Mbc::Mbc3Ram),
                (RAM_BATTERY, Mbc::Mbc3RamBattery),
                (TIMER_BATTERY, Mbc::Mbc3TimerBattery),
                (TIMER_RAM_BATTERY, Mbc::Mbc3TimerRamBattery),
            ],
            Family::Mbc5 => &[
                (NONE, Mbc::Mbc5),
                (RAM, Mbc::Mbc5Ram),
                (RAM_BATTERY, Mbc::Mbc5RamBattery),
                (RUMBLE, Mbc::Mbc5Rumble),
                (RUMBLE_RAM, Mbc::Mbc5RumbleRam),
                (RUMBLE_RAM_BATTERY, Mbc::Mbc5RumbleRamBattery),
            ],
            Family::Mbc6 => &[(NONE, Mbc::Mbc6)],
            Family::Mbc7 => &[(SENSOR_RUMBLE_RAM_BATTERY, Mbc::Mbc7SensorRumbleRamBattery)],
            Family::PocketCamera => &[(NONE, Mbc::PocketCamera)],
            Family::Tama5 => &[(NONE, Mbc::BandaiTama5)],
            Family::HuC1 => &[(RAM_BATTERY, Mbc::HuC1RamBattery)],
            Family::HuC3 => &[(NONE, Mbc::HuC3)],
        };
        table
            .iter()
            .find(|&&(accepted, _)| accepted == features)
            .map(|&(_, mbc)| mbc)
            .ok_or(ParseMbcError::IncompatibleFeatures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(descriptor: &str) -> Result<CartridgeType, ParseMbcError> {
        descriptor.parse()
    }

    fn code(descriptor: &str) -> u8 {
        parse(descriptor).unwrap().code()
    }

    #[test]
    fn named_forms_resolve() {
        assert_eq!(code("ROM"), 0x00);
        assert_eq!(code("ROM ONLY"), 0x00);
        assert_eq!(code("MBC1"), 0x01);
        assert_eq!(code("MBC1+RAM"), 0x02);
        assert_eq!(code("MBC1+RAM+BATTERY"), 0x03);
        assert_eq!(code("MBC2"), 0x05);
        assert_eq!(code("MBC2+BATTERY"), 0x06);
        assert_eq!(code("ROM+RAM"), 0x08);
        assert_eq!(code("ROM+RAM+BATTERY"), 0x09);
        assert_eq!(code("MMM01"), 0x0b);
        assert_eq!(code("MMM01+RAM"), 0x0c);
        assert_eq!(code("MMM01+RAM+BATTERY"), 0x0d);
        assert_eq!(code("MBC3+TIMER+BATTERY"), 0x0f);
        assert_eq!(code("MBC3+TIMER+RAM+BATTERY"), 0x10);
        assert_eq!(code("MBC3"), 0x11);
        assert_eq!(code("MBC3+RAM"), 0x12);
        assert_eq!(code("MBC3+RAM+BATTERY"), 0x13);
        assert_eq!(code("MBC5"), 0x19);
        assert_eq!(code("MBC5+RAM"), 0x1a);
        assert_eq!(code("MBC5+RAM+BATTERY"), 0x1b);
        assert_eq!(code("MBC5+RUMBLE"), 0x1c);
        assert_eq!(code("MBC5+RUMBLE+RAM"), 0x1d);
        assert_eq!(code("MBC5+RUMBLE+RAM+BATTERY"), 0x1e);
        assert_eq!(code("MBC6"), 0x20);
        assert_eq!(code("MBC7+SENSOR+RUMBLE+RAM+BATTERY"), 0x22);
        assert_eq!(code("POCKET CAMERA"), 0xfc);
        assert_eq!(code("BANDAI TAMA5"), 0xfd);
        assert_eq!(code("TAMA5"), 0xfd);
        assert_eq!(code("HUC3"), 0xfe);
        assert_eq!(code("HUC1+RAM+BATTERY"), 0xff);
    }

    #[test]
    fn matching_is_lenient_about_spelling() {
        assert_eq!(code("mbc7+sensor+rumble+ram+battery"), 0x22);
        assert_eq!(code("MBC7+RAM+SENSOR+BATTERY+RUMBLE"), 0x22);
        assert_eq!(code("rom_only"), 0x00);
        assert_eq!(code("POCKET_CAMERA"), 0xfc);
        assert_eq!(code("BANDAI_TAMA5"), 0xfd);
        assert_eq!(code("  MBC5 + RUMBLE + RAM\t+ BATTERY  "), 0x1e);
        assert_eq!(code("Rom + Ram"), 0x08);
    }

    #[test]
    fn numeric_forms() {
        assert_eq!(parse("0"), Ok(CartridgeType::Known(Mbc::Rom)));
        assert_eq!(parse("27"), Ok(CartridgeType::Known(Mbc::Mbc5RamBattery)));
        assert_eq!(parse("0x1B"), Ok(CartridgeType::Known(Mbc::Mbc5RamBattery)));
        assert_eq!(parse("$1b"), Ok(CartridgeType::Known(Mbc::Mbc5RamBattery)));
        assert_eq!(parse("255"), Ok(CartridgeType::Known(Mbc::HuC1RamBattery)));
        // Bytes outside the defined set pass through unchecked.
        assert_eq!(parse("0x42"), Ok(CartridgeType::Unknown(0x42)));
        assert!(!parse("0x42").unwrap().has_ram());
    }

    #[test]
    fn numeric_out_of_range() {
        assert_eq!(parse("256"), Err(ParseMbcError::OutOfRange));
        assert_eq!(parse("0x100"), Err(ParseMbcError::OutOfRange));
        assert_eq!(parse("$fff"), Err(ParseMbcError::OutOfRange));
        assert_eq!(parse("99999999999999999999"), Err(ParseMbcError::OutOfRange));
    }

    #[test]
    fn incompatible_feature_sets() {
        assert_eq!(parse("MBC7+RAM"), Err(ParseMbcError::IncompatibleFeatures));
        assert_eq!(parse("MBC2+RAM"), Err(ParseMbcError::IncompatibleFeatures));
        assert_eq!(parse("ROM+TIMER"), Err(ParseMbcError::IncompatibleFeatures));
        assert_eq!(parse("MBC6+RAM"), Err(ParseMbcError::IncompatibleFeatures));
        assert_eq!(parse("HUC1"), Err(ParseMbcError::IncompatibleFeatures));
        assert_eq!(parse("HUC3+RAM"), Err(ParseMbcError::IncompatibleFeatures));
        assert_eq!(
            parse("MBC3+TIMER"),
            Err(ParseMbcError::IncompatibleFeatures)
        );
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse(""), Err(ParseMbcError::BadSyntax));
        assert_eq!(parse("   "), Err(ParseMbcError::BadSyntax));
        assert_eq!(parse("MBC4"), Err(ParseMbcError::BadSyntax));
        assert_eq!(parse("MBC1-RAM"), Err(ParseMbcError::BadSyntax));
        assert_eq!(parse("MBC1+"), Err(ParseMbcError::BadSyntax));
        assert_eq!(parse("MBC1+RAMX"), Err(ParseMbcError::BadSyntax));
        assert_eq!(parse("MBC1+RAM junk"), Err(ParseMbcError::BadSyntax));
        assert_eq!(parse("ROMONLY"), Err(ParseMbcError::BadSyntax));
        assert_eq!(parse("POCKETCAMERA"), Err(ParseMbcError::BadSyntax));
        assert_eq!(parse("BANDAI"), Err(ParseMbcError::BadSyntax));
        assert_eq!(parse("0xZZ"), Err(ParseMbcError::BadSyntax));
        assert_eq!(parse("HUC2"), Err(ParseMbcError::BadSyntax));
    }

    #[test]
    fn ram_predicate() {
        assert!(Mbc::RomRam.has_ram());
        assert!(Mbc::Mbc3TimerRamBattery.has_ram());
        assert!(Mbc::PocketCamera.has_ram());
        assert!(Mbc::HuC3.has_ram());
        assert!(!Mbc::Rom.has_ram());
        assert!(!Mbc::Mbc2Battery.has_ram());
        assert!(!Mbc::Mbc6.has_ram());
        assert!(!Mbc::BandaiTama5.has_ram());
    }

    #[test]
    fn every_decimal_byte_parses_to_itself() {
        for value in 0u16..=300 {
            let parsed = parse(&value.to_string());
            if value <= 255 {
                assert_eq!(parsed.unwrap().code(), value as u8);
            } else {
                assert_eq!(parsed, Err(ParseMbcError::OutOfRange));
            }
        }
    }

    #[test]
    fn canonical_names_round_trip() {
        for code in 0..=0xffu8 {
            let Some(mbc) = Mbc::from_code(code) else {
                continue;
            };
            assert_eq!(mbc.code(), code);
            // The printable name parses back to the same type.
            assert_eq!(
                mbc.to_string().parse(),
                Ok(CartridgeType::Known(mbc)),
                "{mbc}"
            );
        }
    }
}
