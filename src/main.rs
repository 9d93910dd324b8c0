//! Chipper - CLI Entry Point
//!
//! Commands:
//! - `chipper run <rom>` - Run a ROM headless and print the final display
//! - `chipper play <rom>` - Play a ROM in the terminal

use chipper::{
    load_rom, ConfigError, Cpu, CpuError, KeypadError, MachineConfig, MemoryError, Rom,
    RomError, RunStop,
};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chipper")]
#[command(version)]
#[command(about = "A CHIP-8 virtual machine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that boots a machine.
#[derive(Args)]
struct MachineArgs {
    /// Path to the ROM file
    rom: PathBuf,
    /// RAM size in bytes (overrides the config file)
    #[arg(long)]
    ram_size: Option<usize>,
    /// Call stack depth (overrides the config file)
    #[arg(long)]
    stack_depth: Option<usize>,
    /// JSON machine configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Log program loading and other details
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a ROM without a screen and print the final display
    Run {
        #[command(flatten)]
        machine: MachineArgs,
        /// Maximum number of cycles to run
        #[arg(short, long, default_value = "10000")]
        max_cycles: u64,
        /// Keypad keys (hex digits) held down for the whole run
        #[arg(short, long, num_args = 1.., value_parser = parse_key)]
        keys: Vec<u8>,
    },
    /// Play a ROM in the terminal
    #[cfg(feature = "tui")]
    Play {
        #[command(flatten)]
        machine: MachineArgs,
        /// Steps per 60 Hz frame
        #[arg(short, long, default_value_t = chipper::tui::DEFAULT_SPEED)]
        speed: u32,
    },
}

#[derive(Debug, Error)]
enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to load ROM: {0}")]
    Rom(#[from] RomError),

    #[error("ROM '{name}' is {size} bytes but only {capacity} fit in {ram_size} bytes of RAM (try --ram-size)")]
    RomTooLarge { name: String, size: usize, capacity: usize, ram_size: usize },

    #[error("failed to load program: {0}")]
    Load(#[from] MemoryError),

    #[error("keypad error: {0}")]
    Keypad(#[from] KeypadError),

    #[error("CPU error at PC={pc:#05x}: {source}")]
    Cpu { pc: u16, source: CpuError },

    #[error("unknown opcode {word:#06x} at PC={pc:#05x}")]
    UnknownOpcode { pc: u16, word: u16 },

    #[error("terminal error: {0}")]
    Io(#[from] std::io::Error),
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { machine, max_cycles, keys } => run_headless(&machine, max_cycles, &keys),
        #[cfg(feature = "tui")]
        Commands::Play { machine, speed } => play(&machine, speed),
    };

    if let Err(e) = result {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn parse_key(s: &str) -> Result<u8, String> {
    match u8::from_str_radix(s, 16) {
        Ok(key) if key < 16 => Ok(key),
        _ => Err(format!("'{}' is not a keypad key (0-F)", s)),
    }
}

/// Merge the config file (if any) with command-line overrides.
fn resolve_config(args: &MachineArgs) -> Result<MachineConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => MachineConfig::from_json_file(path)?,
        None => MachineConfig::default(),
    };

    if let Some(ram_size) = args.ram_size {
        config.ram_size = ram_size;
    }
    if let Some(stack_depth) = args.stack_depth {
        config.stack_depth = stack_depth;
    }
    config.verbose |= args.verbose;

    config.validate()?;
    Ok(config)
}

/// Install the tracing subscriber. `RUST_LOG` wins over the defaults.
///
/// The terminal player owns the screen, so it logs nothing unless asked.
fn init_tracing(verbose: bool, interactive: bool) {
    let default = match (interactive, verbose) {
        (true, _) => "off",
        (false, true) => "debug",
        (false, false) => "warn",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn boot(args: &MachineArgs, interactive: bool) -> Result<(Cpu, Rom), AppError> {
    let config = resolve_config(args)?;
    init_tracing(config.verbose, interactive);

    let mut cpu = Cpu::with_config(config)?;
    let rom = load_rom(&args.rom)?;
    check_fits(&rom, cpu.config())?;
    cpu.load_program(&rom.bytes)?;
    info!(
        rom = %rom.name,
        bytes = rom.len(),
        free = cpu.config().program_capacity() - rom.len(),
        "machine ready"
    );

    Ok((cpu, rom))
}

/// Reject a ROM that cannot fit above 0x200 with a message naming both sizes.
fn check_fits(rom: &Rom, config: &MachineConfig) -> Result<(), AppError> {
    let capacity = config.program_capacity();
    if rom.len() > capacity {
        return Err(AppError::RomTooLarge {
            name: rom.name.clone(),
            size: rom.len(),
            capacity,
            ram_size: config.ram_size,
        });
    }
    Ok(())
}

fn run_headless(args: &MachineArgs, max_cycles: u64, keys: &[u8]) -> Result<(), AppError> {
    let (mut cpu, rom) = boot(args, false)?;

    for &key in keys {
        cpu.set_key(key, true)?;
    }

    println!("Running: {} ({} bytes)", rom.name, rom.len());

    let summary = cpu
        .run_limited(max_cycles)
        .map_err(|source| AppError::Cpu { pc: cpu.regs.pc, source })?;

    println!();
    println!("━━━ Display ━━━");
    print!("{}", cpu.display());

    println!();
    println!("━━━ Result ━━━");
    println!("Cycles: {}", summary.cycles);
    println!("PC: {:#05x}  I: {:#05x}  SP: {}", cpu.regs.pc, cpu.regs.i, cpu.regs.sp());
    let regs: Vec<String> = cpu.regs.v.iter().map(|v| format!("{:02X}", v)).collect();
    println!("V0-VF: {}", regs.join(" "));
    println!("Timers: delay={} sound={}", cpu.timers.delay, cpu.timers.sound);
    println!("Sound notifications: {}", summary.beeps);
    if let Some(instr) = cpu.last_instruction() {
        println!("Last instruction: {:?}", instr);
    }

    match summary.stop {
        RunStop::CycleLimit => {
            println!();
            println!("Reached max cycles limit ({}). Use --max-cycles to increase.", max_cycles);
        }
        RunStop::Idle => println!("Stopped: program is idling in a jump loop"),
        RunStop::WaitingForKey => println!("Stopped: waiting for a key (use --keys)"),
        RunStop::UnknownOpcode(word) => {
            return Err(AppError::UnknownOpcode { pc: cpu.regs.pc, word });
        }
    }

    Ok(())
}

#[cfg(feature = "tui")]
fn play(args: &MachineArgs, speed: u32) -> Result<(), AppError> {
    let (cpu, rom) = boot(args, true)?;
    chipper::tui::run_player(cpu, rom, speed)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(ram_size: Option<usize>, stack_depth: Option<usize>) -> MachineArgs {
        MachineArgs {
            rom: PathBuf::from("game.ch8"),
            ram_size,
            stack_depth,
            config: None,
            verbose: false,
        }
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = resolve_config(&args(Some(0x2000), Some(4))).unwrap();
        assert_eq!(config.ram_size, 0x2000);
        assert_eq!(config.stack_depth, 4);

        assert!(resolve_config(&args(Some(0x100), None)).is_err());
    }

    #[test]
    fn test_rom_must_fit_program_area() {
        let config = MachineConfig { ram_size: 0x204, ..MachineConfig::default() };

        let rom = Rom::from_bytes("small", vec![0x12, 0x00, 0x12, 0x00]).unwrap();
        assert!(check_fits(&rom, &config).is_ok());

        let rom = Rom::from_bytes("big", vec![0; 5]).unwrap();
        let err = check_fits(&rom, &config).unwrap_err();
        assert!(matches!(err, AppError::RomTooLarge { size: 5, capacity: 4, .. }));
    }

    #[test]
    fn test_parse_key() {
        assert_eq!(parse_key("a"), Ok(0xA));
        assert_eq!(parse_key("F"), Ok(0xF));
        assert!(parse_key("10").is_err());
        assert!(parse_key("g").is_err());
    }
}
