//! Join a LoRaWAN network and send one uplink.
//!
//! # Requirements
//!
//! - A Mipot 32001353 on a serial port, with its wake line tied low
//! - The application key provisioned, or passed as the second argument
//!   (32 hex digits)
//!
//! # Usage
//!
//! ```sh
//! cargo run -p wmodlib --example join_and_send -- /dev/ttyS0
//! ```

use std::time::Duration;

use wmodlib::mipot::{JoinMode, JoinStatus, MipotBuilder, TxStatus};
use wmodlib::{PinConfiguration, UnconnectedPin, format_hex};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let serial_port = args.next().unwrap_or_else(|| "/dev/ttyS0".to_string());

    let module = MipotBuilder::new()
        .serial_port(&serial_port)
        .build(PinConfiguration::new(UnconnectedPin, UnconnectedPin))
        .await?;

    println!("Firmware: {:08X}", module.get_fw_version().await?);
    println!("DevEUI:   {}", format_hex(&module.get_deveui().await?));

    if let Some(hex) = args.next() {
        if hex.len() != 32 || !hex.is_ascii() {
            anyhow::bail!("application key must be 32 hex digits");
        }
        let key = (0..hex.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&hex[i..i + 2], 16))
            .collect::<Result<Vec<u8>, _>>()?;
        module.set_app_key(&key).await?;
        println!("Application key stored");
    }

    let status = module.join(JoinMode::Otaa).await?;
    if status != JoinStatus::Success {
        anyhow::bail!("join request rejected: {status}");
    }

    match module.wait_for_join(Duration::from_secs(60)).await? {
        Some(true) => println!("Joined"),
        Some(false) => anyhow::bail!("join failed"),
        None => anyhow::bail!("no join result within 60 s"),
    }

    let status = module.tx_msg(b"hello", 1, true).await?;
    if status != TxStatus::Success {
        anyhow::bail!("uplink rejected: {status}");
    }
    if let Some(indication) = module.get_parsed_indication(Duration::from_secs(10)).await? {
        println!("{indication:?}");
    }

    module.close().await?;
    Ok(())
}
