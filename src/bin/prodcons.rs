use colored::Colorize;
use prodcons::{ConfigError, Coordinator, RunConfig, RunError};
use std::path::Path;
use std::process;

fn load_config(args: &[String]) -> Result<RunConfig, ConfigError> {
    match args {
        [flag, path] if flag == "--config" => RunConfig::from_file(Path::new(path)),
        _ => RunConfig::from_args(args),
    }
}

fn run() -> Result<(), RunError> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = load_config(&args)?;

    println!(
        "{}",
        format!(
            "Running {} producer(s) and {} consumer(s) on a {}-slot buffer for {} ms",
            config.producers, config.consumers, config.capacity, config.run_duration_ms
        )
        .bold()
    );

    let report = Coordinator::new(config)?.run()?;

    println!("\n=== Summary ===");
    println!("  Produced: {}", report.produced);
    println!("  Consumed: {}", report.consumed);
    println!("  Left in buffer: {}", report.leftover.len());
    if report.is_conserved() {
        println!("{}", "  ✓ No items lost or duplicated".green());
    } else {
        println!("{}", "  ✗ Item counts do not balance".red());
    }
    Ok(())
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{} {}", "error:".red().bold(), err);
        process::exit(1);
    }
}
