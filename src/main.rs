use std::fs::{File, OpenOptions};
use std::io;

use clap::Parser;

use gbfix::cli::Args;
use gbfix::diag::Reporter;
use gbfix::plan::PatchPlan;
use gbfix::process;

fn main() {
    let args = Args::parse();
    let plan = PatchPlan::from_args(&args);

    let mut failed = false;
    if args.files.is_empty() {
        failed |= patch_stdio(&plan);
    } else {
        for name in &args.files {
            failed |= patch_path(&plan, name);
        }
    }
    if failed {
        std::process::exit(1);
    }
}

/// Patches standard input to standard output. Returns whether it failed.
fn patch_stdio(plan: &PatchPlan) -> bool {
    let mut reporter = Reporter::new();
    let stdin = io::stdin();
    let stdout = io::stdout();
    if let Err(err) = process::patch_stream(plan, &mut stdin.lock(), &mut stdout.lock()) {
        reporter.error(format_args!("<stdin>: {err}"));
    }
    reporter.is_failed()
}

/// Patches one pathname in place. Returns whether it failed.
fn patch_path(plan: &PatchPlan, name: &str) -> bool {
    if name == "-" {
        return patch_stdio(plan);
    }
    let mut reporter = Reporter::new();
    match open_rom(name) {
        Ok((mut file, size)) => {
            if let Err(err) = process::patch_file(plan, &mut file, size) {
                reporter.error(format_args!("{name}: {err}"));
            }
        }
        Err(err) => reporter.error(format_args!("{name}: {err}")),
    }
    reporter.is_failed()
}

/// Opens a ROM for in-place editing. In-place mode needs to seek, so the
/// pathname must be a regular file; pipes only work through `-`.
fn open_rom(name: &str) -> io::Result<(File, u64)> {
    let file = OpenOptions::new().read(true).write(true).open(name)?;
    let metadata = file.metadata()?;
    if !metadata.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a regular file",
        ));
    }
    Ok((file, metadata.len()))
}
