use std::path::PathBuf;
use clap::{Parser, Subcommand};
use crate::structs::{Compliance, Region};

#[derive(Parser, Debug)]
#[command(author, version, about = "Send VLT registration and location packets to state servers")]
pub struct Arguments {
    /// YAML config file (falls back to $CONFIG_FILE_PATH, then ./config.yaml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub action: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the endpoint used for each region
    Regions,
    /// Register a device with a regional server
    Register {
        #[arg(short, long, value_enum)]
        region: Region,
        /// 15-digit IMEI
        #[arg(short, long)]
        imei: String,
        #[arg(short = 'C', long, value_enum, default_value_t = Compliance::Cdac)]
        compliance: Compliance,
    },
    /// Send one location packet per IMEI
    Send {
        #[arg(short, long, value_enum)]
        region: Region,
        /// Comma-separated IMEIs
        #[arg(short, long)]
        imeis: String,
        #[arg(long)]
        latitude: String,
        #[arg(long)]
        longitude: String,
    },
    /// Pull IMEI and position out of a device sentence and send it
    Extract {
        #[arg(short, long, value_enum)]
        region: Region,
        /// e.g. "#123456789012345#10.5000,N,76.2500,E,"
        #[arg(short, long)]
        format: String,
    },
    /// Keep sending the same device position until the duration elapses or Ctrl-C
    Continuous {
        #[arg(short, long, value_enum)]
        region: Region,
        #[arg(short, long, required_unless_present = "format")]
        imei: Option<String>,
        #[arg(long, required_unless_present = "format")]
        latitude: Option<String>,
        #[arg(long, required_unless_present = "format")]
        longitude: Option<String>,
        #[arg(short, long, conflicts_with_all = ["imei", "latitude", "longitude"])]
        format: Option<String>,
        /// Seconds between sends (defaults to the config value)
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        interval: Option<u64>,
        /// Seconds to keep sending
        #[arg(short, long, default_value_t = crate::consts::DEFAULT_DURATION_SECS)]
        duration: u64,
    },
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn continuous_accepts_either_input() {
        let args = Arguments::try_parse_from([
            "vlt_sender", "continuous", "-r", "kerala", "-f", "#123456789012345#10.5,N,76.2,E,",
        ])
        .unwrap();
        assert!(matches!(args.action, Command::Continuous { format: Some(_), imei: None, duration: 60, .. }));

        let args = Arguments::try_parse_from([
            "vlt_sender", "continuous", "-r", "bengal", "-i", "123456789012345", "--latitude", "22.5",
            "--longitude", "88.3", "--interval", "5",
        ])
        .unwrap();
        assert!(matches!(args.action, Command::Continuous { region: Region::Bengal, interval: Some(5), .. }));
    }

    #[test]
    fn continuous_needs_a_device() {
        assert!(Arguments::try_parse_from(["vlt_sender", "continuous", "-r", "kerala"]).is_err());
        assert!(Arguments::try_parse_from([
            "vlt_sender", "continuous", "-r", "kerala", "-i", "123456789012345", "-f", "#x#",
        ])
        .is_err());
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(Arguments::try_parse_from([
            "vlt_sender", "continuous", "-r", "kerala", "-f", "#x#", "--interval", "0",
        ])
        .is_err());
    }

    #[test]
    fn register_defaults_to_cdac() {
        let args = Arguments::try_parse_from(["vlt_sender", "register", "-r", "karnataka", "-i", "123456789012345"]).unwrap();
        assert!(matches!(args.action, Command::Register { compliance: Compliance::Cdac, .. }));
    }
}
