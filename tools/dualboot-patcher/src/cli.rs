use clap::{Parser, Subcommand};
use kernel_patch::ProductVariant;
use log::LevelFilter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "dualboot-patcher",
    version,
    about = "Surface Duo Dual Boot Kernel Image Patcher",
    long_about = "Patches an AArch64 kernel image so that it can boot either the kernel or an appended UEFI firmware image",
    args_conflicts_with_subcommands = true,
    subcommand_negates_reqs = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub patch: PatchArgs,

    /// More output (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(clap::Args, Debug)]
pub struct PatchArgs {
    /// Kernel image to patch
    #[arg(value_name = "KERNEL", required = true)]
    pub kernel: Option<PathBuf>,

    /// UEFI FD image
    #[arg(value_name = "FIRMWARE", required = true)]
    pub firmware: Option<PathBuf>,

    /// Target product (0: Epsilon, 1: Zeta)
    #[arg(value_name = "PRODUCT", required = true)]
    pub product: Option<ProductVariant>,

    /// Patched kernel image destination
    #[arg(value_name = "OUTPUT", required = true)]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the dual boot parameters of an already patched image
    Inspect {
        /// Patched kernel image
        image: PathBuf,
    },
}

impl Args {
    pub const fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}
