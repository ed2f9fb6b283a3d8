use anyhow::{Context, Result};
use clap::Parser;
use handheld::CliArgs;

fn main() -> Result<()> {
    env_logger::init();
    let args = CliArgs::parse();
    let program = handheld::read_program(&args.input_path).with_context(|| {
        format!(
            "Failed to read code from given input file({}).",
            args.input_path.display()
        )
    })?;

    let repair = handheld::repair_search(&program)
        .context("Failed to repair given code by exchanging one jmp or nop.")?;
    println!(
        "Exchanged instruction at {} to {}, code run through to end without loop, and the final accumulator value is {}.",
        repair.index,
        repair.program.as_slice()[repair.index],
        repair.acc
    );

    Ok(())
}
