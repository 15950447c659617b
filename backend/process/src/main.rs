use std::path::PathBuf;

use bank::BANK_PATH;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON seed file
    seed: PathBuf,

    #[arg(short, long, default_value = BANK_PATH)]
    output: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let report = process::import(&args.seed, &args.output)?;

    println!("\n{report}");
    println!("Wrote bank to {}", args.output.display());

    Ok(())
}
