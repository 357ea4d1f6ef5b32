//! Clap derive structures for the `carrot-home` daemon.

use std::path::PathBuf;

use clap::Parser;

/// carrot-home -- Carrot Home cloud lights on MQTT / Home Assistant
#[derive(Debug, Parser)]
#[command(
    name = "carrot-home",
    version,
    about = "Bridge Carrot Home cloud lights to MQTT and Home Assistant",
    long_about = "Polls the Carrot Home cloud for light state, announces each light\n\
        through Home Assistant MQTT discovery, and forwards ON/OFF commands\n\
        back to the cloud."
)]
pub struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, short = 'c', env = "CARROT_HOME_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Validate the configuration, print a summary and exit
    #[arg(long)]
    pub check_config: bool,
}
