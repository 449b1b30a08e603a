//! Paging simulator - demo entry point
//!
//! Usage: paging-sim [OPTIONS] [memory_bytes frame_bytes]
//!
//! Arguments:
//!   memory_bytes - Physical memory size in bytes (default 1 MiB)
//!   frame_bytes  - Frame size in bytes (default 4 KiB)
//!
//! Options:
//!   -v, --verbose  Log every allocator and process-manager event
//!   -h, --help     Print help information

use std::env;
use std::process;

use paging_sim::constants::{
    DEFAULT_FRAME_SIZE, DEFAULT_MEMORY_SIZE, MAX_PROCESS_SIZE, MAX_PROCESSES,
};
use paging_sim::error::SimError;
use paging_sim::memory::PhysicalMemory;
use paging_sim::process::ProcessManager;
use paging_sim::report;

struct Config {
    memory_bytes: usize,
    frame_bytes: usize,
    verbose: bool,
}

fn main() {
    let config = match parse_args() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    let mut builder = env_logger::Builder::from_default_env();
    if config.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();

    if let Err(e) = run(&config) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn print_help(program: &str) {
    eprintln!("Paging simulator - frame allocation and per-process page tables");
    eprintln!();
    eprintln!("Usage: {} [OPTIONS] [memory_bytes frame_bytes]", program);
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  memory_bytes - Physical memory size in bytes (default {})", DEFAULT_MEMORY_SIZE);
    eprintln!("  frame_bytes  - Frame size in bytes (default {})", DEFAULT_FRAME_SIZE);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -v, --verbose  Log every allocator and process-manager event");
    eprintln!("  -h, --help     Print this help message");
}

fn parse_args() -> Result<Config, String> {
    let args: Vec<String> = env::args().collect();
    let program = &args[0];

    let mut verbose = false;
    let mut positional: Vec<&String> = Vec::new();

    for arg in &args[1..] {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help(program);
                process::exit(0);
            }
            "-v" | "--verbose" => {
                verbose = true;
            }
            _ if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}\nUse --help for usage information.", arg));
            }
            _ => {
                positional.push(arg);
            }
        }
    }

    let (memory_bytes, frame_bytes) = match positional.len() {
        0 => (DEFAULT_MEMORY_SIZE, DEFAULT_FRAME_SIZE),
        2 => {
            let memory: usize = positional[0]
                .parse()
                .map_err(|_| format!("Invalid memory size: {}", positional[0]))?;
            let frame: usize = positional[1]
                .parse()
                .map_err(|_| format!("Invalid frame size: {}", positional[1]))?;
            (memory, frame)
        }
        n => {
            print_help(program);
            return Err(format!("\nError: Expected 0 or 2 arguments, got {}", n));
        }
    };

    Ok(Config { memory_bytes, frame_bytes, verbose })
}

fn run(config: &Config) -> Result<(), SimError> {
    let mut pm = PhysicalMemory::new(config.memory_bytes, config.frame_bytes)?;
    let mut gp = ProcessManager::new(MAX_PROCESSES, MAX_PROCESS_SIZE);

    println!("{}", report::memory_status(&pm));

    // Raw frame operations
    let q1 = pm.allocate_frame()?;
    let q2 = pm.allocate_frame()?;
    let q3 = pm.allocate_frame()?;
    println!("Allocated frames: {}, {}, {}", q1, q2, q3);

    pm.free_frame(q2)?;
    println!("Freed frame {}", q2);

    let address = pm.frame_base(q1);
    pm.write_byte(address, 42)?;
    let value = pm.read_byte(address)?;
    println!("Wrote and read back {} at address {}", value, address);

    let stats = pm.frame_stats();
    println!("Free frames: {}, occupied: {}", stats.free, stats.occupied);

    // Return the raw frames before handing memory to the process manager
    pm.free_frame(q1)?;
    pm.free_frame(q3)?;
    println!();

    // Process lifecycle
    gp.create_process(&mut pm, 1, 10000)?;
    gp.create_process(&mut pm, 2, 24 * 1024)?;
    gp.create_process(&mut pm, 3, 300)?;

    println!("{}", report::process_list(&gp));
    println!("{}", report::page_table_report(&gp, 1)?);
    println!("{}", report::frame_map(&pm, 64));

    // An impossible request fails atomically
    match gp.create_process(&mut pm, 4, MAX_PROCESS_SIZE + 1) {
        Err(e) => println!("Rejected oversized process: {}", e),
        Ok(id) => println!("Unexpectedly created process {}", id),
    }

    gp.remove_process(&mut pm, 2)?;
    println!("Removed process 2");
    println!();

    println!("{}", report::process_list(&gp));
    println!("{}", report::memory_status(&pm));
    Ok(())
}
