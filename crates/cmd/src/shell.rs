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

use std::{io, sync::Arc};

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use crate::session::Session;

const HELP: &str = "\
commands:
  download <tag>...          start downloading, the outcome is printed when it settles
  check <tag>...             whether every tag is installed
  release <tag>...           end access to a downloaded tag set
  path <name> [ext]          locate a resource file
  priority <0..1> <tag>...   set preservation priority
  confirm <tag>              allow a pack above the confirmation threshold
  online | offline           toggle simulated connectivity
  reservations               list held tag sets
  log <level>                change the log filter, e.g. `debug`
  help | quit";

/// Read commands from stdin until EOF or `quit`. Downloads run in the
/// background so connectivity and confirmation can change while they wait.
pub async fn run(session: Session) -> io::Result<()> {
    let session = Arc::new(session);
    let printer = tokio::spawn({
        let session = Arc::clone(&session);
        let mut progress = session.subscribe_progress();
        async move { while session.on_progress(progress.recv().await) {} }
    });
    info!("shell started");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            [] => {}
            ["help"] => println!("{HELP}"),
            ["quit" | "exit"] => break,
            ["download", tags @ ..] if !tags.is_empty() => {
                let tags: Vec<String> = tags.iter().map(ToString::to_string).collect();
                let session = Arc::clone(&session);
                tokio::spawn(async move { session.settle(&tags).await });
            }
            ["check", tags @ ..] if !tags.is_empty() => {
                session.check(tags).await;
            }
            ["release", tags @ ..] if !tags.is_empty() => session.release(tags).await,
            ["path", name] => {
                session.path(name, "").await;
            }
            ["path", name, ext] => {
                session.path(name, ext).await;
            }
            ["priority", value, tags @ ..] if !tags.is_empty() => match value.parse::<f64>() {
                Ok(priority) => session.priority(priority, tags).await,
                Err(_) => eprintln!("invalid priority `{value}`"),
            },
            ["confirm", tag] => {
                session.confirm(tag);
            }
            ["online"] => session.set_online(true),
            ["offline"] => session.set_online(false),
            ["reservations"] => session.reservations().await,
            ["log", level] => {
                if !dynres_common_telemetry::reload_level(level) {
                    eprintln!("invalid log level `{level}`");
                }
            }
            _ => eprintln!("unknown command `{line}`, type `help`"),
        }
    }

    printer.abort();
    info!("shell finished");
    Ok(())
}
