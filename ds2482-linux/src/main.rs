use clap::Parser;
use ds2482::{Ds2482Builder, OneWire};
use embedded_onewire::{OneWireSearch, OneWireSearchKind};

/// List the 1-Wire devices behind a DS2482 I2C to 1-Wire bridge
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to I2C bus (e.g., /dev/i2c-1)
    #[arg(short, long)]
    path: String,
    /// 7-bit I2C address of the bridge
    #[arg(short, long, default_value = "0x18", value_parser = parse_hex_u8)]
    address: u8,
    /// Status re-reads before a 1-Wire operation is abandoned
    #[arg(long, default_value_t = ds2482::DEFAULT_POLL_LIMIT)]
    poll_limit: u8,
    /// Only list devices in alarm state
    #[arg(long)]
    alarm: bool,
    /// Only list devices of this family code (e.g., 0x28)
    #[arg(short, long, value_parser = parse_hex_u8)]
    family: Option<u8>,
    /// Check that the device with this ROM code is present, instead of listing
    #[arg(long, value_parser = parse_hex_u64)]
    verify: Option<u64>,
}

fn parse_hex_u8(s: &str) -> Result<u8, String> {
    u8::from_str_radix(s.trim_start_matches("0x"), 16).map_err(|e| e.to_string())
}

fn parse_hex_u64(s: &str) -> Result<u64, String> {
    u64::from_str_radix(s.trim_start_matches("0x"), 16).map_err(|e| e.to_string())
}

fn main() {
    // Initialize the logger
    env_logger::init();
    // Parse command line arguments
    let args = Args::parse();
    // Open the I2C bus
    let i2c = linux_embedded_hal::I2cdev::new(&args.path).expect("Failed to open I2C device");
    let delay = linux_embedded_hal::Delay;
    // Reset the bridge and write the standard configuration
    let mut ds2482 = Ds2482Builder::default()
        .with_address(args.address)
        .with_poll_limit(args.poll_limit)
        .build(i2c, delay)
        .expect("Failed to detect DS2482");
    log::info!("DS2482 detected at {:#04x}", args.address);

    let status = ds2482.reset().expect("Failed to reset 1-Wire bus");
    if ds2482.short_detected() {
        log::error!("1-Wire bus is shorted");
        std::process::exit(1);
    }
    log::debug!("bus reset status: {status:?}");

    let kind = if args.alarm {
        OneWireSearchKind::Alarmed
    } else {
        OneWireSearchKind::Normal
    };
    let mut search = match args.family {
        Some(family) => OneWireSearch::with_family(&mut ds2482, kind, family),
        None => OneWireSearch::new(&mut ds2482, kind),
    };

    if let Some(rom) = args.verify {
        let present = search.verify(rom).expect("Failed to verify device");
        println!("{rom:016x} {}", if present { "present" } else { "absent" });
        std::process::exit(if present { 0 } else { 2 });
    }

    let mut devices = 0;
    while let Some(rom) = search.next().expect("Failed to search 1-Wire bus") {
        devices += 1;
        let bytes = rom.to_le_bytes();
        println!("{rom:016x} family {:02x} serial {:02x?}", bytes[0], &bytes[1..7]);
    }
    log::info!("Found {} devices", devices);
}
