//! Command-line interface definitions and parsing

use std::path::PathBuf;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "dtniotsc", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Collect identities written by peers instead of sending our own
    /// (true/false, yes/no, 1/0)
    #[arg(
        short,
        long,
        global = true,
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub collector: Option<bool>,

    /// Bluetooth adapter (i.e. hci0)
    #[arg(short, long, global = true)]
    pub bluetooth: Option<String>,

    /// Configuration file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start GATT service and advertisements
    Start(StartArgs),
    /// Ask a running daemon whether a peer is connected
    Status,
}

#[derive(Args, Debug, Clone, Default)]
pub struct StartArgs {
    /// Host name of the hub, %IP is replaced with the current IP address
    #[arg(short = 'd', long = "deviceid")]
    pub device_id: Option<String>,

    /// Bluetooth alias name
    #[arg(short, long)]
    pub alias: Option<String>,

    /// Log info messages (-vv for debug messages)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Stop BLE advertising while a peer is connected
    #[arg(long)]
    pub auto_advertise: bool,

    /// Output file for log/debug
    #[arg(short, long)]
    pub log_file: Option<PathBuf>,
}
