//! `diskimg create` command — create an empty raw image.

use clap::Args;
use diskimg_core::Quantity;
use diskimg_runtime::ImageOperations;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Destination raw image
    pub dest: PathBuf,
    /// Image size (e.g. 10Gi)
    pub size: Quantity,
}

pub fn execute(
    args: CreateArgs,
    ops: &dyn ImageOperations,
) -> Result<(), Box<dyn std::error::Error>> {
    ops.create_blank_image(&args.dest, &args.size)?;
    println!("{}", args.dest.display());
    Ok(())
}
