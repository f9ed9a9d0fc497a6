//! The header patch plan.
//!
//! Command-line options are folded into one read-only [`PatchPlan`] value,
//! built once and then threaded to the file processor. Truncations and
//! cross-option sanity checks happen here, before any file is touched.

use std::convert::Infallible;
use std::str::FromStr;

use bitflags::bitflags;

use crate::cli::Args;
use crate::diag;
use crate::mbc::{CartridgeType, Mbc};

/// Console model support declared at `$0143`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Model {
    /// Monochrome only; the flag byte is left alone.
    #[default]
    Dmg,
    /// Color-compatible, `$80`.
    Both,
    /// Color-only, `$C0`.
    Cgb,
}

bitflags! {
    /// Header fields to fix, or to deliberately trash with their bitwise
    /// complement (useful for exercising boot-ROM reject paths).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FixSpec: u8 {
        const FIX_LOGO = 1 << 0;
        const TRASH_LOGO = 1 << 1;
        const FIX_HEADER_SUM = 1 << 2;
        const TRASH_HEADER_SUM = 1 << 3;
        const FIX_GLOBAL_SUM = 1 << 4;
        const TRASH_GLOBAL_SUM = 1 << 5;
    }
}

impl FixSpec {
    /// Sets `wanted`, dropping its opposite if already present.
    fn prefer(&mut self, wanted: FixSpec, opposite: FixSpec) {
        self.remove(opposite);
        self.insert(wanted);
    }
}

impl FromStr for FixSpec {
    type Err = Infallible;

    /// Each character toggles one fix or trash bit; the later of an opposing
    /// pair wins, with a warning. Unknown characters are warned about and
    /// skipped.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut spec = FixSpec::empty();
        for c in s.chars() {
            let (wanted, opposite) = match c {
                'l' => (Self::FIX_LOGO, Self::TRASH_LOGO),
                'L' => (Self::TRASH_LOGO, Self::FIX_LOGO),
                'h' => (Self::FIX_HEADER_SUM, Self::TRASH_HEADER_SUM),
                'H' => (Self::TRASH_HEADER_SUM, Self::FIX_HEADER_SUM),
                'g' => (Self::FIX_GLOBAL_SUM, Self::TRASH_GLOBAL_SUM),
                'G' => (Self::TRASH_GLOBAL_SUM, Self::FIX_GLOBAL_SUM),
                _ => {
                    diag::warning(format_args!("ignoring unknown character '{c}' in fix spec"));
                    continue;
                }
            };
            if spec.contains(opposite) {
                diag::warning(format_args!(
                    "'{c}' overrides its opposite earlier in the fix spec"
                ));
            }
            spec.prefer(wanted, opposite);
        }
        Ok(spec)
    }
}

/// Everything the user asked to change in the header.
#[derive(Debug, Clone)]
pub struct PatchPlan {
    pub model: Model,
    pub fix_spec: FixSpec,
    /// Up to 4 bytes at `$013F`.
    pub game_id: Option<Vec<u8>>,
    /// `false` stores `$01` (overseas) at `$014A`; `true` leaves the byte.
    pub japanese: bool,
    /// Up to 2 bytes at `$0144`.
    pub new_licensee: Option<Vec<u8>>,
    pub old_licensee: Option<u8>,
    pub cartridge_type: Option<CartridgeType>,
    pub rom_version: Option<u8>,
    /// Also enables size rounding and the `$0148` size byte.
    pub pad_value: Option<u8>,
    pub ram_size: Option<u8>,
    /// Stores `$03` at `$0146`.
    pub sgb: bool,
    /// Up to 16 bytes at `$0134`; shorter caps apply with a game ID or a
    /// color model.
    pub title: Option<Vec<u8>>,
}

impl Default for PatchPlan {
    fn default() -> Self {
        Self {
            model: Model::Dmg,
            fix_spec: FixSpec::empty(),
            game_id: None,
            japanese: true,
            new_licensee: None,
            old_licensee: None,
            cartridge_type: None,
            rom_version: None,
            pad_value: None,
            ram_size: None,
            sgb: false,
            title: None,
        }
    }
}

/// Truncates `value` to `max` bytes, warning with the field name.
fn truncate(field: &str, value: &str, max: usize) -> Vec<u8> {
    let mut bytes = value.as_bytes().to_vec();
    if bytes.len() > max {
        diag::warning(format_args!(
            "truncating {field} \"{value}\" to {max} characters"
        ));
        bytes.truncate(max);
    }
    bytes
}

impl PatchPlan {
    pub fn from_args(args: &Args) -> Self {
        let model = if args.color_only {
            Model::Cgb
        } else if args.color_compatible {
            Model::Both
        } else {
            Model::Dmg
        };

        let mut fix_spec = args.fix_spec.unwrap_or_default();
        if args.validate {
            fix_spec.prefer(FixSpec::FIX_LOGO, FixSpec::TRASH_LOGO);
            fix_spec.prefer(FixSpec::FIX_HEADER_SUM, FixSpec::TRASH_HEADER_SUM);
            fix_spec.prefer(FixSpec::FIX_GLOBAL_SUM, FixSpec::TRASH_GLOBAL_SUM);
        }

        let game_id = args.game_id.as_deref().map(|id| truncate("game ID", id, 4));
        let title_cap = if game_id.is_some() {
            11
        } else if model != Model::Dmg {
            15
        } else {
            16
        };
        let title = args
            .title
            .as_deref()
            .map(|title| truncate("title", title, title_cap));
        let new_licensee = args
            .new_licensee
            .as_deref()
            .map(|licensee| truncate("new licensee", licensee, 2));

        let plan = Self {
            model,
            fix_spec,
            game_id,
            japanese: !args.non_japanese,
            new_licensee,
            old_licensee: args.old_licensee,
            cartridge_type: args.mbc_type,
            rom_version: args.rom_version,
            pad_value: args.pad_value,
            ram_size: args.ram_size,
            sgb: args.sgb_compatible,
            title,
        };
        plan.lint();
        plan
    }

    /// Cross-option sanity checks. Advisory only; none of these fail.
    fn lint(&self) {
        if let Some(kind) = self.cartridge_type {
            if matches!(
                kind,
                CartridgeType::Known(Mbc::RomRam | Mbc::RomRamBattery)
            ) {
                diag::warning(format_args!("cartridge type {kind} is under-specified"));
                if self.ram_size.is_some_and(|size| size != 1) {
                    diag::warning(format_args!("RAM size for {kind} should be 1"));
                }
            } else if let Some(size) = self.ram_size {
                if !kind.has_ram() && size != 0 {
                    diag::warning(format_args!(
                        "cartridge type {kind} has no RAM, but RAM size is {size}"
                    ));
                } else if kind.has_ram() && size == 0 {
                    diag::warning(format_args!(
                        "cartridge type {kind} has RAM, but RAM size is 0"
                    ));
                }
            }
        }
        if self.sgb && self.old_licensee.is_some_and(|code| code != 0x33) {
            diag::warning("SGB flag is ignored when the old licensee code is not $33");
        }
    }
}
