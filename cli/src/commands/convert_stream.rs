//! `diskimg convert-stream` command — convert a remote qcow2 image to raw
//! without staging it locally.

use clap::Args;
use diskimg_runtime::ImageOperations;
use std::path::PathBuf;
use url::Url;

#[derive(Args, Debug)]
pub struct ConvertStreamArgs {
    /// HTTP(S) URL of the source qcow2 image
    pub url: Url,
    /// Destination raw image
    pub dest: PathBuf,
}

pub fn execute(
    args: ConvertStreamArgs,
    ops: &dyn ImageOperations,
) -> Result<(), Box<dyn std::error::Error>> {
    ops.convert_qcow2_to_raw_stream(&args.url, &args.dest)?;
    println!("{}", args.dest.display());
    Ok(())
}
