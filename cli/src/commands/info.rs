//! `diskimg info` command — display image metadata as JSON.

use clap::Args;
use diskimg_runtime::ImageOperations;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Image to inspect
    pub image: PathBuf,
}

pub fn execute(args: InfoArgs, ops: &dyn ImageOperations) -> Result<(), Box<dyn std::error::Error>> {
    let info = ops.info(&args.image)?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}
