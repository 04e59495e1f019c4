use anyhow::{anyhow, Context, Result};
use env_logger::Builder;
use jit_crash_categorizer::{categorize_file, config::CategorizerConfig, models::Categorization};
use log::{error, LevelFilter};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

// Simple CLI without clap
fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let verbose = args.iter().any(|a| a == "--verbose" || a == "-V");

    // Initialize logger; stdout is reserved for the label
    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}",
                std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or_default(),
                record.level(),
                record.args()
            )
        })
        .filter(None, if verbose { LevelFilter::Debug } else { LevelFilter::Info })
        .parse_default_env()
        .init();

    let program = args.first().map(String::as_str).unwrap_or("jit-crash-categorize");

    match run(&args) {
        Ok(Outcome::Categorized(categorization)) => {
            println!("{}", categorization);
            ExitCode::SUCCESS
        }
        Ok(Outcome::Informational) => ExitCode::SUCCESS,
        Ok(Outcome::UsageError) => {
            eprint!("{}", usage(program));
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{:#}", e);
            println!("ERROR");
            ExitCode::FAILURE
        }
    }
}

/// What a command line invocation produced
enum Outcome {
    /// A label to print
    Categorized(Categorization),
    /// Version or help was printed
    Informational,
    /// No minidump was given
    UsageError,
}

fn usage(program: &str) -> String {
    format!(
        "JIT Crash Categorizer v{version}

Usage:
  {program} [--config PATH] [--address HEX] [--verbose] <MINIDUMP>
  {program} --version

Options:
  --config, -c PATH    Load the tuning profile from a JSON file
  --address, -a HEX    Analyse this address instead of the exception PC
  --verbose, -V        Log gate decisions, scan passes and a hex dump
  --version, -v        Show version information
  --help, -h           Show this message
",
        version = jit_crash_categorizer::VERSION,
        program = program
    )
}

fn parse_address(value: &str) -> Result<u64> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    u64::from_str_radix(digits, 16).with_context(|| format!("Invalid address: {}", value))
}

fn run(args: &[String]) -> Result<Outcome> {
    let program = args.first().map(String::as_str).unwrap_or("jit-crash-categorize");

    // Check for --version command
    if args.len() > 1 && (args[1] == "--version" || args[1] == "-v") {
        println!("JIT Crash Categorizer v{}", jit_crash_categorizer::VERSION);
        return Ok(Outcome::Informational);
    }

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print!("{}", usage(program));
        return Ok(Outcome::Informational);
    }

    // Parse optional arguments
    let mut minidump = None;
    let mut config_path = None;
    let mut address = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                let value = args.get(i + 1).ok_or_else(|| anyhow!("Missing value for --config"))?;
                config_path = Some(PathBuf::from(value));
                i += 2;
            }
            "--address" | "-a" => {
                let value = args.get(i + 1).ok_or_else(|| anyhow!("Missing value for --address"))?;
                address = Some(parse_address(value)?);
                i += 2;
            }
            "--verbose" | "-V" => {
                i += 1;
            }
            arg if arg.starts_with('-') => {
                return Err(anyhow!("Unknown argument: {}", arg));
            }
            arg => {
                if minidump.is_some() {
                    return Err(anyhow!("Only one minidump can be categorized at a time"));
                }
                minidump = Some(PathBuf::from(arg));
                i += 1;
            }
        }
    }

    let minidump = match minidump {
        Some(minidump) => minidump,
        None => return Ok(Outcome::UsageError),
    };

    let config = match &config_path {
        Some(path) => CategorizerConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => CategorizerConfig::default(),
    };

    let categorization = categorize_file(&minidump, config, address)
        .with_context(|| format!("Failed to categorize {}", minidump.display()))?;
    Ok(Outcome::Categorized(categorization))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0x401000").unwrap(), 0x401000);
        assert_eq!(parse_address("0XDEADBEEF").unwrap(), 0xdead_beef);
        assert_eq!(parse_address("ffff").unwrap(), 0xffff);
        assert!(parse_address("0x").is_err());
        assert!(parse_address("zz").is_err());
    }

    #[test]
    fn test_missing_minidump_is_a_usage_error() {
        let args = |list: &[&str]| list.iter().map(|a| a.to_string()).collect::<Vec<_>>();

        assert!(matches!(run(&args(&["jit-crash-categorize"])), Ok(Outcome::UsageError)));
        assert!(matches!(run(&args(&["jit-crash-categorize", "--verbose"])), Ok(Outcome::UsageError)));
        assert!(matches!(run(&args(&["jit-crash-categorize", "--help"])), Ok(Outcome::Informational)));
        assert!(run(&args(&["jit-crash-categorize", "--address"])).is_err());
    }
}
