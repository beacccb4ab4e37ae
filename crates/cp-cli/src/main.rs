/*
 *
 *
 *
 *
 * MIT License
 * Copyright (c) 2025. Dwight J. Browne
 * dwight[-at-]dwightjbrowne[-dot-]com
 *
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all
 * copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 */

use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{run::RunArgs, schedule::ScheduleArgs, schema::SchemaArgs};
use config::ConfigArgs;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "cpipe")]
#[command(propagate_version = true)]
struct Cli {
  #[command(subcommand)]
  command: Commands,

  #[command(flatten)]
  config: ConfigArgs,

  /// Verbose output
  #[arg(short, long, global = true)]
  verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
  /// Fetch, stage, transform and load once
  Run(RunArgs),

  /// Fetch a market snapshot into the working directory
  Fetch,

  /// Normalize the raw snapshot in the working directory
  Transform,

  /// Append the normalized table in the working directory to the warehouse
  Load,

  /// Run the pipeline on a fixed interval
  Schedule(ScheduleArgs),

  /// Print the destination table schema
  Schema(SchemaArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
  // Load environment variables
  dotenv().ok();

  // Parse CLI arguments
  let cli = Cli::parse();

  // Initialize logging; RUST_LOG wins over --verbose
  let log_level = if cli.verbose { "debug" } else { "info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
  tracing_subscriber::fmt().with_env_filter(filter).init();

  // Schema needs no configuration
  if let Commands::Schema(args) = cli.command {
    return commands::schema::execute(args);
  }

  let config = config::load(&cli.config)?;

  match cli.command {
    Commands::Run(args) => commands::run::execute(args, config).await?,
    Commands::Fetch => commands::steps::fetch(config).await?,
    Commands::Transform => commands::steps::transform(config).await?,
    Commands::Load => commands::steps::load(config).await?,
    Commands::Schedule(args) => commands::schedule::execute(args, config).await?,
    Commands::Schema(args) => commands::schema::execute(args)?,
  }

  Ok(())
}
