//! `diskimg convert` command — convert a local qcow2 image to raw.

use clap::Args;
use diskimg_runtime::ImageOperations;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Source qcow2 image
    pub src: PathBuf,
    /// Destination raw image
    pub dest: PathBuf,
}

pub fn execute(
    args: ConvertArgs,
    ops: &dyn ImageOperations,
) -> Result<(), Box<dyn std::error::Error>> {
    ops.convert_qcow2_to_raw(&args.src, &args.dest)?;
    println!("{}", args.dest.display());
    Ok(())
}
