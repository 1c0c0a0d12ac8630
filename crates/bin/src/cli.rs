//! CLI argument definitions for the Mirrordoc binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Mirror in-memory containers into a document store
#[derive(Parser, Debug)]
#[command(name = "mirrordoc")]
#[command(about = "Mirrordoc: mirror nested containers into a document store")]
#[command(version)]
pub struct Cli {
    /// Print documents as compact JSON instead of a readable listing
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a bounded sequence, mutate it and print the mirrored document
    Demo(DemoArgs),
    /// Print the documents of a persisted store
    Show(ShowArgs),
}

/// Store file shared by every command
#[derive(clap::Args, Debug)]
pub struct StoreArgs {
    /// JSON file the in-memory store is loaded from and saved to
    #[arg(short = 'f', long, default_value = "mirrordoc.json", env = "MIRRORDOC_DATA_FILE")]
    pub data_file: PathBuf,
}

/// Arguments for the demo command
#[derive(clap::Args, Debug)]
pub struct DemoArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Mirror settings file; missing means defaults
    #[arg(short, long, env = "MIRRORDOC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Field path of the mirrored sequence
    #[arg(short, long, default_value = "inner.arr", env = "MIRRORDOC_PATH")]
    pub path: String,

    /// Value of the `array_id` field selecting the document
    #[arg(long, default_value = "example")]
    pub id: String,

    /// Capacity of the bounded sequence
    #[arg(long, default_value_t = 10)]
    pub capacity: usize,

    /// Do not write the store back to the data file
    #[arg(long)]
    pub no_save: bool,
}

/// Arguments for the show command
#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Only print the document whose `array_id` equals this value
    #[arg(long)]
    pub id: Option<String>,
}
