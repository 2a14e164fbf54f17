use env_logger::Env;
use grue_probe::config::ProbeConfig;
use grue_probe::header::Header;
use grue_probe::properties::analyze_table_at;
use grue_probe::report::{exit_status, Report, TableListing};
use grue_probe::story::StoryFile;
use grue_probe::text;
use grue_probe::{ProbeError, ProbeResult};
use log::{debug, info};
use std::env;
use std::path::Path;
use std::process;

fn print_usage(program: &str) {
    println!("grue-probe - static checker for Z-Machine story files");
    println!();
    println!("Usage:");
    println!(
        "  {} <story_file> [--steps N] [--start 0xADDR] [--config FILE] [--properties]",
        program
    );
    println!("  {} decode-text <hex bytes>", program);
    println!("  {} packed-addr <addr> [version]", program);
    println!("  {} property <story_file> <table_addr>", program);
    println!("  {} string <story_file> <addr>", program);
    println!();
    println!("Addresses are hex, with or without 0x prefix.");
    println!("Exit status: number of property violations (at most 100),");
    println!("101 bad story file, 102 I/O error, 103 usage or config error.");
}

/// Hex value with or without a 0x prefix
fn parse_hex(value: &str, what: &str) -> ProbeResult<usize> {
    let digits = value.trim_start_matches("0x").trim_start_matches("0X");
    usize::from_str_radix(digits, 16)
        .map_err(|_| ProbeError::Usage(format!("Invalid {}: {}", what, value)))
}

fn parse_hex_bytes(value: &str) -> ProbeResult<Vec<u8>> {
    let digits: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ProbeError::Usage(format!("Invalid hex bytes: {}", value)));
    }
    if digits.len() % 2 != 0 {
        return Err(ProbeError::Usage(format!(
            "Hex string needs an even number of digits: {}",
            value
        )));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| ProbeError::Usage(format!("Invalid hex bytes: {}", value)))
        })
        .collect()
}

fn arg<'a>(args: &'a [String], index: usize, what: &str) -> ProbeResult<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| ProbeError::Usage(format!("Missing {}", what)))
}

fn run_report(args: &[String]) -> ProbeResult<i32> {
    let story_path = &args[1];
    let mut config_path = None;
    let mut steps = None;
    let mut start = None;
    let mut list_properties = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--steps" => {
                let value = arg(args, i + 1, "value for --steps")?;
                steps = Some(value.parse::<usize>().map_err(|_| {
                    ProbeError::Usage(format!("Invalid step count: {}", value))
                })?);
                i += 1;
            }
            "--start" => {
                start = Some(parse_hex(arg(args, i + 1, "value for --start")?, "start PC")?);
                i += 1;
            }
            "--config" => {
                config_path = Some(arg(args, i + 1, "value for --config")?);
                i += 1;
            }
            "--properties" => list_properties = true,
            other => return Err(ProbeError::Usage(format!("Unknown option: {}", other))),
        }
        i += 1;
    }

    let mut config = match config_path {
        Some(path) => ProbeConfig::load(Path::new(path))?,
        None => ProbeConfig::default(),
    };
    if let Some(steps) = steps {
        if steps == 0 {
            return Err(ProbeError::Usage("--steps must be at least 1".into()));
        }
        config.max_steps = steps;
    }
    if start.is_some() {
        config.start_pc = start;
    }
    config.list_properties |= list_properties;
    debug!("Effective config: {:?}", config);

    let story = StoryFile::load(Path::new(story_path))?;
    info!("Probing {} ({} bytes)", story_path, story.len());

    let report = Report::build(story.bytes(), &config)?;
    print!("{}", report);
    Ok(report.exit_status())
}

fn run(args: &[String]) -> ProbeResult<i32> {
    match args[1].as_str() {
        "decode-text" => {
            let bytes = parse_hex_bytes(arg(args, 2, "hex bytes")?)?;
            let (decoded, consumed) = text::decode_with_len(&bytes);
            println!("\"{}\" ({} bytes)", decoded, consumed);
            Ok(0)
        }
        "packed-addr" => {
            let packed = parse_hex(arg(args, 2, "packed address")?, "packed address")?;
            let packed = u16::try_from(packed).map_err(|_| {
                ProbeError::Usage(format!("Packed address too large: {:#x}", packed))
            })?;
            let version = match args.get(3) {
                Some(v) => v
                    .parse::<u8>()
                    .map_err(|_| ProbeError::Usage(format!("Invalid version: {}", v)))?,
                None => 3,
            };
            println!(
                "Packed {:#06x} (v{}) -> byte address {:#06x}",
                packed,
                version,
                text::unpack_address(packed, version)
            );
            Ok(0)
        }
        "property" => {
            let story = StoryFile::load(Path::new(arg(args, 2, "story file")?))?;
            let table_addr = parse_hex(arg(args, 3, "table address")?, "table address")?;
            let header = Header::parse(story.bytes())?;
            let table = analyze_table_at(story.bytes(), &header, table_addr);
            print!("{}", TableListing { table: &table });
            Ok(exit_status(table.violations.len()))
        }
        "string" => {
            let story = StoryFile::load(Path::new(arg(args, 2, "story file")?))?;
            let addr = parse_hex(arg(args, 3, "address")?, "address")?;
            println!("{:#06x}: \"{}\"", addr, text::decode_at(story.bytes(), addr));
            Ok(0)
        }
        _ => run_report(args),
    }
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("grue-probe");

    // No arguments is a request for help, not an error
    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage(program);
        return;
    }

    match run(&args) {
        Ok(status) => process::exit(status),
        Err(e) => {
            eprintln!("Error: {}", e);
            if matches!(e, ProbeError::Usage(_)) {
                eprintln!();
                print_usage(program);
            }
            process::exit(e.exit_code());
        }
    }
}
