//! `diskimg resize` command — resize a raw image in place.

use clap::Args;
use diskimg_core::Quantity;
use diskimg_runtime::ImageOperations;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ResizeArgs {
    /// Raw image to resize
    pub image: PathBuf,
    /// New size (e.g. 10Gi, 512M)
    pub size: Quantity,
}

pub fn execute(
    args: ResizeArgs,
    ops: &dyn ImageOperations,
) -> Result<(), Box<dyn std::error::Error>> {
    ops.resize(&args.image, &args.size)?;
    Ok(())
}
