// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod build_info;
mod session;
mod settings;
mod shell;

use std::{path::PathBuf, process::ExitCode};

use clap::{Args, Parser, Subcommand};
use session::{Output, Session};
use settings::Settings;
use snafu::{ResultExt, Whatever};

#[derive(Debug, Parser)]
#[clap(
name = "dynres",
about = "Download and locate on-demand resource packs",
author = build_info::AUTHOR,
version = build_info::FULL_VERSION,
long_version = build_info::LONG_VERSION)]
struct Cli {
    /// Config file (TOML, YAML or JSON). `DYNRES__*` variables override it.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Print results and progress as JSON lines.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    commands: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Check(CheckArgs),
    Download(DownloadArgs),
    Path(PathArgs),
    Shell(ShellArgs),
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Report whether every pack is already installed. Never downloads.
Examples:

dynres check level1 level2

")]
struct CheckArgs {
    #[arg(required = true)]
    tags: Vec<String>,
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Download packs, printing progress until all of them are installed.
Examples:

dynres download level1 level2
dynres --json download level1

")]
struct DownloadArgs {
    #[arg(required = true)]
    tags: Vec<String>,
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Print where an installed resource file lives.
Examples:

dynres path kichi512 png

")]
struct PathArgs {
    name: String,
    #[arg(default_value = "")]
    ext:  String,
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Interactive session over one long-lived coordinator. Type `help` inside.
Examples:

dynres shell

")]
struct ShellArgs {}

#[tokio::main]
async fn main() -> Result<ExitCode, Whatever> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).whatever_context("failed to load settings")?;
    let _guards = dynres_common_telemetry::init_global_logging("dynres", &settings.logging);
    dynres_common_telemetry::set_panic_hook("dynres");
    tracing::debug!(?settings, "settings loaded");

    let session = Session::new(&settings, Output::new(cli.json));
    let ok = match cli.commands {
        Commands::Check(args) => session.check(&args.tags).await,
        Commands::Download(args) => session.download(&args.tags).await,
        Commands::Path(args) => session.path(&args.name, &args.ext).await,
        Commands::Shell(_) => {
            shell::run(session)
                .await
                .whatever_context("failed to read from stdin")?;
            true
        }
    };
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
