use clap::{Parser, Subcommand};
use serial_session::config::{Config, ConfigLoader};
use serial_session::error::AppResult;
use serial_session::logging;
use serial_session::port::{
    DeviceInfo, OpenOptions, Port, PortRegistry, PortResult, SystemProvider,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "serial-session",
    version,
    about = "List and probe serial ports.",
    long_about = "Lists the serial ports of this machine with their metadata, and probes a port by opening it with the configured defaults and exercising each transfer mode once."
)]
struct Cli {
    /// Configuration file to use instead of the standard locations.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every serial port with its metadata.
    List {
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Open a port and exercise it.
    Probe {
        /// Port name, device path or configured alias.
        name: String,

        /// Baud rate, overriding the configured default.
        #[arg(long)]
        baud: Option<u32>,

        /// Deadline for the bounded transfers, in milliseconds.
        #[arg(long, default_value_t = 1)]
        deadline_ms: u64,

        /// Switch to 8N1 without flow control after opening.
        #[arg(long)]
        raw: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => ConfigLoader::load_from(path),
        None => ConfigLoader::load(),
    };
    let config = match loaded {
        Ok(loader) => loader.into_config(),
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    logging::init(&config.logging, cli.verbose);

    match run(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "command failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command, config: &Config) -> AppResult<()> {
    let registry = config.serial.registry(Arc::new(SystemProvider::new()));

    match command {
        Command::List { json } => list(&registry, json),
        Command::Probe {
            name,
            baud,
            deadline_ms,
            raw,
        } => {
            let options = OpenOptions {
                baud_rate: baud,
                ..OpenOptions::new()
            }
            .or(&config.serial.open_options());
            probe(
                &registry,
                &name,
                &options,
                Duration::from_millis(deadline_ms),
                raw,
            )
        }
    }
}

fn list(registry: &PortRegistry, json: bool) -> AppResult<()> {
    let ports = registry.enumerate()?;

    if json {
        let infos = ports
            .iter()
            .map(Port::info)
            .collect::<Result<Vec<DeviceInfo>, _>>()?;
        println!("{}", serde_json::to_string_pretty(&infos)?);
        return Ok(());
    }

    println!("Found {} ports:", ports.len());
    for port in &ports {
        let (bus, address) = port.usb_bus_address()?;
        let (vid, pid) = port.usb_vid_pid()?;

        println!("{}", port.addr()?);
        println!("\tDescription: {}", port.description()?);
        println!("\tTransport: {:?}", port.transport()?);
        println!("\tUSB bus: {bus}\taddress: {address}");
        println!("\tUSB vid: {vid:04x}\tpid: {pid:04x}");
        println!("\tUSB Manufacturer: {}", port.usb_manufacturer()?);
        println!("\tUSB Product: {}", port.usb_product()?);
        println!("\tUSB Serial Number: {}", port.usb_serial_number()?);
        println!("\tBluetooth Address: {}", port.bluetooth_address()?);
    }
    Ok(())
}

fn report<T: std::fmt::Debug>(label: &str, result: PortResult<T>) {
    match result {
        Ok(value) => println!("\t{label}: {value:?}"),
        Err(err) => println!("\t{label}: {err}"),
    }
}

fn probe(
    registry: &PortRegistry,
    name: &str,
    options: &OpenOptions,
    deadline: Duration,
    raw: bool,
) -> AppResult<()> {
    let port = registry.open(name, options)?;
    info!(port = %port.addr()?, "probing port");

    println!("{}", port.addr()?);
    println!("\tConfiguration: {:?}", port.config()?);
    println!("\tFlow control: {:?}", port.flow_control()?);
    println!("\tHandle: {}", port.raw_handle()?);

    if raw {
        report("Apply raw config", port.apply_raw_config());
    }
    report("Input waiting", port.input_waiting());
    report("Output waiting", port.output_waiting());

    let mut buffer = [0u8; 1];

    port.set_deadline(Some(Instant::now()))?;
    report("Read immediate", port.read(&mut buffer));
    report("Write immediate", port.write(&[0]));

    port.set_deadline(Some(Instant::now() + deadline))?;
    report("Read wait", port.read(&mut buffer));
    port.set_deadline(Some(Instant::now() + deadline))?;
    report("Write wait", port.write(&[0]));

    port.set_deadline(None)?;
    report("Flush", port.flush());
    report("Drain", port.drain());

    port.close()?;
    Ok(())
}
