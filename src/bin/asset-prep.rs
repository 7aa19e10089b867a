//! asset-prep CLI tool
//!
//! Background removal for product photos and print normalization for 3D
//! assets, built on the asset_prep library.

#[cfg(feature = "cli")]
use asset_prep::cli;

#[cfg(feature = "cli")]
fn main() -> std::process::ExitCode {
    cli::main()
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}
