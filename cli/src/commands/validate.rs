//! `diskimg validate` command — check an image is importable.

use clap::Args;
use diskimg_core::error::ImageError;
use diskimg_core::Quantity;
use diskimg_runtime::ImageOperations;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Image to validate
    pub image: PathBuf,

    /// Expected image format
    #[arg(long, default_value = "qcow2")]
    pub format: String,

    /// Space available for the image's virtual size (e.g. 20Gi)
    #[arg(long)]
    pub available: Quantity,
}

pub fn execute(
    args: ValidateArgs,
    ops: &dyn ImageOperations,
) -> Result<(), Box<dyn std::error::Error>> {
    let available = i64::try_from(args.available.bytes()).map_err(|_| {
        ImageError::InvalidQuantity {
            input: args.available.to_string(),
            reason: "too large".to_string(),
        }
    })?;
    ops.validate(&args.image, &args.format, available)?;
    println!("{}: ok", args.image.display());
    Ok(())
}
