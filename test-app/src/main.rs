// wmodlib test application -- CLI tool for exercising the Mipot 32001353
// driver against real hardware or a mock transport.
//
// Usage:
//   wmodlib-test-app --port /dev/ttyS0 info
//   wmodlib-test-app --port /dev/ttyS0 eeprom read 0x08 8
//   wmodlib-test-app --port /dev/ttyS0 app-key 000102030405060708090A0B0C0D0E0F
//   wmodlib-test-app --port /dev/ttyS0 join --abp
//   wmodlib-test-app --port /dev/ttyS0 wait-join --timeout 60
//   wmodlib-test-app --port /dev/ttyS0 tx --fport 10 --confirmed 48656C6C6F
//   wmodlib-test-app --port /dev/ttyS0 channel 3 867100000 --min-dr 0 --max-dr 5
//   wmodlib-test-app --port /dev/ttyS0 -v monitor --duration 120
//   wmodlib-test-app --mock info
//
// The wake and reset lines are not driven by this tool; wire the wake line
// low (module always awake) when using it.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::debug;

use wmodlib::mipot::{JoinMode, MipotBuilder, MipotModule, ReplyPolicy, TxStatus};
use wmodlib::{PinConfiguration, UnconnectedPin, WirelessModule, format_freq_mhz, format_hex};
use wmodlib_test_harness::MockTransport;
use wmodlib_transport::DEFAULT_BAUD_RATE;

type Module = MipotModule<UnconnectedPin, UnconnectedPin>;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// wmodlib test application -- exercises the Mipot driver from the command line.
#[derive(Parser)]
#[command(name = "wmodlib-test-app", version, about)]
struct Cli {
    /// Serial port path (e.g. /dev/ttyS0, COM3).
    /// Required unless --mock is used.
    #[arg(long)]
    port: Option<String>,

    /// Override the default baud rate.
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,

    /// Receive attempts per command.
    #[arg(long, default_value_t = 8)]
    retries: u32,

    /// Fail instead of returning the last frame when no matching reply
    /// arrives.
    #[arg(long)]
    strict: bool,

    /// Use a mock transport instead of a real serial port.
    /// Useful for verifying CLI parsing and builder wiring without hardware.
    #[arg(long)]
    mock: bool,

    /// Enable debug logging (RUST_LOG overrides).
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print module identification: firmware, serial number, EUIs.
    Info,

    /// Print the network configuration stored in EEPROM.
    Config,

    /// Print the network activation status.
    Status,

    /// EEPROM operations.
    Eeprom {
        #[command(subcommand)]
        action: EepromAction,
    },

    /// Store the OTAA application key (32 hex digits, MSB first).
    AppKey {
        #[arg(value_parser = parse_hex_bytes)]
        key: Vec<u8>,
    },

    /// Start joining the network (OTAA unless --abp).
    Join {
        #[arg(long)]
        abp: bool,
    },

    /// Wait for the result of a join.
    WaitJoin {
        /// Timeout in seconds.
        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },

    /// Send an uplink (payload as hex).
    Tx {
        /// Payload bytes as hex, e.g. 48656C6C6F.
        #[arg(value_parser = parse_hex_bytes)]
        data: Vec<u8>,

        /// LoRaWAN application port (1-223).
        #[arg(long, default_value_t = 1)]
        fport: u8,

        /// Request a confirmation from the network.
        #[arg(long)]
        confirmed: bool,
    },

    /// Configure one channel (3-15) of the channel plan.
    Channel {
        channel: u8,

        /// Center frequency in hertz (e.g. 867100000).
        frequency_hz: u32,

        #[arg(long, default_value_t = 0)]
        min_dr: u8,

        #[arg(long, default_value_t = 5)]
        max_dr: u8,

        /// Disable the channel instead of enabling it.
        #[arg(long)]
        disabled: bool,
    },

    /// Print indications as they arrive.
    Monitor {
        /// Duration in seconds (0 = run until interrupted).
        #[arg(long, default_value_t = 0)]
        duration: u64,
    },

    /// Reset the module.
    Reset {
        /// Pulse the reset line instead of sending the reset command.
        #[arg(long)]
        hard: bool,
    },
}

#[derive(Subcommand)]
enum EepromAction {
    /// Read bytes from EEPROM.
    Read {
        /// Start address (hex, e.g. 0x20).
        #[arg(value_parser = parse_hex_u8)]
        address: u8,

        /// Number of bytes to read.
        len: u8,
    },
    /// Write bytes to EEPROM.
    Write {
        /// Start address (hex, e.g. 0x20).
        #[arg(value_parser = parse_hex_u8)]
        address: u8,

        /// Data bytes as hex, e.g. 0102.
        #[arg(value_parser = parse_hex_bytes)]
        data: Vec<u8>,
    },
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse a hex string like "0x20" or "20" into a u8.
fn parse_hex_u8(s: &str) -> std::result::Result<u8, String> {
    let s = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u8::from_str_radix(s, 16).map_err(|e| format!("invalid hex byte: {e}"))
}

/// Parse a run of hex digit pairs (spaces and colons allowed) into bytes.
fn parse_hex_bytes(s: &str) -> std::result::Result<Vec<u8>, String> {
    let digits: String = s
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    if digits.len() % 2 != 0 {
        return Err("odd number of hex digits".into());
    }
    digits
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|p| u8::from_str_radix(p, 16).ok())
                .ok_or_else(|| format!("invalid hex digits: {}", String::from_utf8_lossy(pair)))
        })
        .collect()
}

/// Install the tracing subscriber. `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .compact(),
        )
        .with(filter)
        .try_init();
}

// ---------------------------------------------------------------------------
// Module construction
// ---------------------------------------------------------------------------

async fn create_module(cli: &Cli) -> Result<Module> {
    let policy = if cli.strict {
        ReplyPolicy::Strict
    } else {
        ReplyPolicy::BestEffort
    };
    let builder = MipotBuilder::new()
        .baud_rate(cli.baud)
        .max_retries(cli.retries)
        .reply_policy(policy);
    let pins = PinConfiguration::new(UnconnectedPin, UnconnectedPin);

    if cli.mock {
        let mock = MockTransport::new();
        return builder
            .build_with_transport(Box::new(mock), pins)
            .await
            .context("failed to build module with mock transport");
    }

    let port = cli
        .port
        .as_deref()
        .context("--port is required unless --mock is used")?;
    debug!(port, baud = cli.baud, "connecting");
    builder
        .serial_port(port)
        .build(pins)
        .await
        .with_context(|| format!("failed to open module on {port}"))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn cmd_info(module: &Module) -> Result<()> {
    println!("Module Information");
    println!("  Module:         {}", module.info());
    println!("  Firmware:       {:08X}", module.get_fw_version().await?);
    println!("  Serial number:  {:08X}", module.get_serial_no().await?);
    println!("  DevEUI:         {}", format_hex(&module.get_deveui().await?));
    println!("  JoinEUI:        {}", format_hex(&module.get_join_eui().await?));
    Ok(())
}

async fn cmd_config(module: &Module) -> Result<()> {
    println!("Network Configuration");
    println!("  Class:          {}", module.get_class().await?);
    println!(
        "  ADR:            {}",
        if module.get_adr().await? { "on" } else { "off" }
    );
    println!("  Unconf. repeat: {}", module.get_unconfirmed_repeat().await?);
    println!("  Network:        {}", module.get_network_type().await?);
    Ok(())
}

async fn cmd_eeprom_read(module: &Module, address: u8, len: u8) -> Result<()> {
    match module.eeprom_read(address, len).await? {
        Some(data) => println!("0x{address:02X}: {}", format_hex(&data)),
        None => bail!("EEPROM read failed"),
    }
    Ok(())
}

async fn cmd_eeprom_write(module: &Module, address: u8, data: &[u8]) -> Result<()> {
    if !module.eeprom_write(address, data).await? {
        bail!("EEPROM write failed");
    }
    println!("Wrote {} bytes at 0x{address:02X}", data.len());
    Ok(())
}

async fn cmd_wait_join(module: &Module, timeout: u64) -> Result<()> {
    println!("Waiting up to {timeout} s for join result...");
    match module.wait_for_join(Duration::from_secs(timeout)).await? {
        Some(true) => println!("Joined"),
        Some(false) => bail!("join failed"),
        None => bail!("no join result within {timeout} s"),
    }
    Ok(())
}

async fn cmd_tx(module: &Module, data: &[u8], fport: u8, confirmed: bool) -> Result<()> {
    let status = module.tx_msg(data, fport, confirmed).await?;
    println!("Transmit: {status}");
    if status != TxStatus::Success {
        bail!("uplink rejected");
    }
    Ok(())
}

async fn cmd_channel(
    module: &Module,
    channel: u8,
    frequency_hz: u32,
    min_dr: u8,
    max_dr: u8,
    enabled: bool,
) -> Result<()> {
    let status = module
        .set_ch_parameters(channel, frequency_hz, min_dr, max_dr, enabled)
        .await?;
    println!(
        "Channel {channel} at {} DR{min_dr}-DR{max_dr} {}: {status}",
        format_freq_mhz(frequency_hz),
        if enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}

async fn cmd_monitor(module: &Module, duration: u64) -> Result<()> {
    let deadline = (duration > 0)
        .then(|| tokio::time::Instant::now() + Duration::from_secs(duration));
    println!("Monitoring indications...");

    loop {
        let poll = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
                if remaining.is_zero() {
                    return Ok(());
                }
                remaining.min(Duration::from_secs(1))
            }
            None => Duration::from_secs(1),
        };

        if let Some(indication) = module.get_parsed_indication(poll).await? {
            println!("{:<14} {indication:?}", indication.name());
        }
    }
}

async fn cmd_reset(module: &Module, hard: bool) -> Result<()> {
    if hard {
        module.reset().await?;
    } else {
        module.soft_reset().await?;
    }
    println!("Module reset");
    Ok(())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let module = create_module(&cli).await?;

    let result = match &cli.command {
        Command::Info => cmd_info(&module).await,
        Command::Config => cmd_config(&module).await,
        Command::Status => module
            .get_activation_status()
            .await
            .map(|status| println!("Activation: {status}"))
            .map_err(Into::into),
        Command::Eeprom { action } => match action {
            EepromAction::Read { address, len } => cmd_eeprom_read(&module, *address, *len).await,
            EepromAction::Write { address, data } => {
                cmd_eeprom_write(&module, *address, data).await
            }
        },
        Command::AppKey { key } => module
            .set_app_key(key)
            .await
            .map(|()| println!("Application key stored"))
            .map_err(Into::into),
        Command::Join { abp } => {
            let mode = if *abp { JoinMode::Abp } else { JoinMode::Otaa };
            module
                .join(mode)
                .await
                .map(|status| println!("Join ({mode:?}): {status}"))
                .map_err(Into::into)
        }
        Command::WaitJoin { timeout } => cmd_wait_join(&module, *timeout).await,
        Command::Tx {
            data,
            fport,
            confirmed,
        } => cmd_tx(&module, data, *fport, *confirmed).await,
        Command::Channel {
            channel,
            frequency_hz,
            min_dr,
            max_dr,
            disabled,
        } => {
            cmd_channel(
                &module,
                *channel,
                *frequency_hz,
                *min_dr,
                *max_dr,
                !*disabled,
            )
            .await
        }
        Command::Monitor { duration } => cmd_monitor(&module, *duration).await,
        Command::Reset { hard } => cmd_reset(&module, *hard).await,
    };

    module.close().await.ok();
    result
}
