mod cli;

use anyhow::{Context, Result, bail};
use clap::Parser;
use cli::{Args, Command, PatchArgs};
use kernel_patch::KernelPatcher;
use kernel_patch::inspect::PatchedImage;
use log::{debug, warn};
use std::fs;
use std::path::Path;

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level())
        .parse_default_env()
        .format_timestamp(None)
        .format_target(false)
        .init();

    println!(
        "Surface Duo Dual Boot Kernel Image Patcher v{}",
        env!("CARGO_PKG_VERSION")
    );
    println!("Copyright (c) 2021-2023 The DuoWoA authors");
    println!();

    match args.command {
        Some(Command::Inspect { image }) => inspect(&image),
        None => patch(args.patch),
    }
}

fn patch(args: PatchArgs) -> Result<()> {
    let (Some(kernel_path), Some(firmware_path), Some(product), Some(output)) =
        (args.kernel, args.firmware, args.product, args.output)
    else {
        bail!("usage: <Kernel Image to Patch> <UEFI FD Image> <0: Epsilon, 1: Zeta> <Patched Kernel Image Destination>");
    };

    let patcher = KernelPatcher::new(product);
    println!(
        "Patching {} with {} for {} and saving to {}...",
        kernel_path.display(),
        firmware_path.display(),
        patcher.variant(),
        output.display()
    );
    println!();

    let kernel = read(&kernel_path)?;
    let firmware = read(&firmware_path)?;

    let image = patcher
        .patch(&kernel, &firmware)
        .with_context(|| format!("patching {}", kernel_path.display()))?;

    fs::write(&output, &image).with_context(|| format!("writing {}", output.display()))?;
    debug!("wrote {} bytes to {}", image.len(), output.display());

    println!("Image successfully patched.");
    println!(
        "Please find the newly made kernel image at {}",
        output.display()
    );
    Ok(())
}

fn inspect(path: &Path) -> Result<()> {
    let blob = read(path)?;
    let image =
        PatchedImage::parse(&blob).with_context(|| format!("inspecting {}", path.display()))?;

    println!("image:          {}", path.display());
    println!(
        "product:        {} ({})",
        image.variant(),
        image.variant().selector()
    );
    println!("kernel entry:   {}", image.kernel_branch());
    println!("stack base:     {:#018x}", image.stack_base());
    println!("stack size:     {:#018x}", image.stack_size());
    println!("launch offset:  {:#x}", image.launch_offset());
    println!("kernel size:    {} bytes", image.kernel().len());
    println!("firmware size:  {} bytes", image.firmware().len());
    if !image.matches_profile() {
        warn!(
            "stack parameters differ from the {} defaults",
            image.variant()
        );
    }
    Ok(())
}

fn read(path: &Path) -> Result<Vec<u8>> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    debug!("read {} bytes from {}", bytes.len(), path.display());
    Ok(bytes)
}
