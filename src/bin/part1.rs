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

    let (acc, terminated) = handheld::execute(&program);
    if terminated {
        println!(
            "The code runs through to end without loop, and the accumulator is {}.",
            acc
        );
    } else {
        println!(
            "Before the first repeated execution of a same instruction, the accumulator is {}.",
            acc
        );
    }

    Ok(())
}
