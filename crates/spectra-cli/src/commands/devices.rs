//! Audio input device listing.

use clap::Args;
use spectra_io::{default_input_device, list_input_devices};

#[derive(Args)]
pub struct DevicesArgs {
    /// Print the list as JSON
    #[arg(long)]
    json: bool,

    /// Show only the default input device
    #[arg(long = "default")]
    default_only: bool,
}

pub fn run(args: DevicesArgs) -> anyhow::Result<()> {
    if args.default_only {
        let device = default_input_device()?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&device)?);
        } else if let Some(device) = device {
            println!(
                "[{}] {} ({} Hz, {} ch)",
                device.index, device.name, device.default_sample_rate, device.default_channels
            );
        } else {
            println!("No default input device.");
        }
        return Ok(());
    }

    let devices = list_input_devices()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    if devices.is_empty() {
        println!("No input devices found.");
        return Ok(());
    }

    println!("Input Devices");
    println!("=============\n");
    for device in &devices {
        let marker = if device.is_default { " (default)" } else { "" };
        println!(
            "  [{}] {} ({} Hz, {} ch){}",
            device.index, device.name, device.default_sample_rate, device.default_channels, marker
        );
    }
    println!();
    println!("Tip: select a device by index or partial name with --device:");
    println!("  spectra monitor --device 0");

    Ok(())
}
