use clap::{Parser, Subcommand};
use kvlink_lib::constants::DEFAULT_PORT;
use kvlink_lib::{
    Command, DeviceRegistry, DmAddress, HeartbeatOutcome, HeartbeatService, LinkConfig, PlcLink, ScreenState,
    decode_heartbeat, report_state,
};
use std::error::Error;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "One-shot tools for talking to the station PLC")]
struct Args {
    /// PLC IP address
    #[arg(long, global = true)]
    host: Option<String>,

    #[arg(short, long, global = true, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Bound on each connect, write and read, in milliseconds
    #[arg(long, global = true, default_value_t = 2000)]
    timeout_ms: u64,

    /// Verbose logging (shows raw frames)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Read one DM register and print its value field
    Read { address: DmAddress },

    /// Write a single value to a DM register
    Write { address: DmAddress, value: u16 },

    /// Push a screen state to a station's result register
    Status {
        /// Station identifier, e.g. T1
        device: String,
        /// disappeared, ready, pass or fail
        state: ScreenState,
    },

    /// Run heartbeat cycles for a station and print what was echoed
    Heartbeat {
        device: String,

        #[arg(short, long, default_value_t = 1)]
        count: u32,

        #[arg(short, long, default_value_t = 500)]
        interval_ms: u64,
    },

    /// List the known stations and their registers
    Registry,
}

impl Args {
    fn link_config(&self) -> Result<LinkConfig, Box<dyn Error>> {
        let host = self.host.as_deref().ok_or("--host is required for this command")?;
        let config = LinkConfig {
            port: self.port,
            io_timeout: Duration::from_millis(self.timeout_ms),
            ..LinkConfig::new(host)
        };
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let log_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(log_level).init();

    let registry = DeviceRegistry::builtin();

    match &args.command {
        Cmd::Registry => {
            println!("{:<6} {:<9} {:<8} {:<8} {:<10} {:<10}", "ID", "CLASS", "RESULT", "SCANNER", "HB SEND", "HB RECV");
            for profile in registry.iter() {
                let a = &profile.addresses;
                println!(
                    "{:<6} {:<9} {:<8} {:<8} {:<10} {:<10}",
                    profile.id,
                    profile.class.to_string(),
                    a.result.to_string(),
                    a.scanner.to_string(),
                    a.heartbeat_send.to_string(),
                    a.heartbeat_recv.to_string()
                );
            }
        }

        Cmd::Read { address } => {
            let link = PlcLink::from_config(&args.link_config()?);
            let command = Command::Read {
                address: address.clone(),
            };
            let reply = link.send(&command).await?.unwrap_or_default();
            info!(raw = hex::encode(&reply), "Reply");
            let value = decode_heartbeat(&reply)?;
            println!("{command} -> {}", String::from_utf8_lossy(&value));
        }

        Cmd::Write { address, value } => {
            let link = PlcLink::from_config(&args.link_config()?);
            let command = Command::WriteScalar {
                address: address.clone(),
                value: *value,
            };
            link.send(&command).await?;
            println!("{command}");
        }

        Cmd::Status { device, state } => {
            let link = PlcLink::from_config(&args.link_config()?);
            let profile = registry.lookup(device)?;
            let vector = report_state(&link, &profile.addresses.result, *state).await?;
            println!("{} {state} -> WRS {} 4 {vector}", profile.id, profile.addresses.result);
        }

        Cmd::Heartbeat {
            device,
            count,
            interval_ms,
        } => {
            let config = args.link_config()?;
            let profile = registry.lookup(device)?;
            let service = HeartbeatService::new(PlcLink::from_config(&config), &profile.addresses, &config);
            info!(
                device = %profile.id,
                recv = %profile.addresses.heartbeat_recv,
                send = %profile.addresses.heartbeat_send,
                "Probing heartbeat"
            );

            for i in 0..*count {
                if i > 0 {
                    tokio::time::sleep(Duration::from_millis(*interval_ms)).await;
                }
                match service.step().await {
                    Ok(HeartbeatOutcome::Echoed { received, sent }) => {
                        println!("received {received}, sent {sent}");
                    }
                    Ok(HeartbeatOutcome::NoSignal { raw }) => {
                        println!("no pulse (register holds {:?})", String::from_utf8_lossy(&raw));
                    }
                    Err(e) => error!(kind = %e.kind(), "Heartbeat failed: {e}"),
                }
            }
        }
    }

    Ok(())
}
