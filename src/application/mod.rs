//! Session wiring: loads the backing store, runs either a one-shot
//! command or the interactive prompt, and syncs after every mutation.

use std::io::{self, BufRead, Write as _};

use colored::Colorize;
use snafu::prelude::*;
use tracing::debug;

use crate::cli::Cli;
use crate::shell::{self, ShellError};
use crate::store::{FileTree, FileTreeError};
use crate::tree::TagTree;

pub struct Application;

/// A tree with or without a file behind it.
enum Session {
    Persistent(FileTree),
    Ephemeral(TagTree),
}

impl Session {
    fn tree_mut(&mut self) -> &mut TagTree {
        match self {
            Session::Persistent(store) => store.tree_mut(),
            Session::Ephemeral(tree) => tree,
        }
    }

    async fn sync(&mut self) -> Result<(), FileTreeError> {
        match self {
            Session::Persistent(store) => store.sync().await,
            Session::Ephemeral(_) => Ok(()),
        }
    }
}

impl Application {
    pub async fn run(cli: Cli) -> Result<(), ApplicationError> {
        let mut session = match &cli.file {
            Some(path) => {
                debug!("Loading tree from {}", path.display());
                Session::Persistent(FileTree::load(path).await.context(StoreSnafu)?)
            }
            None => Session::Ephemeral(TagTree::new()),
        };

        if let Some(line) = &cli.command {
            let output = shell::run(line, session.tree_mut()).context(CommandSnafu)?;
            if !output.is_empty() {
                println!("{output}");
            }
            session.sync().await.context(StoreSnafu)?;
            return Ok(());
        }

        Self::repl(&mut session).await
    }

    async fn repl(session: &mut Session) -> Result<(), ApplicationError> {
        let color = supports_color::on(supports_color::Stream::Stdout).is_some();
        let stdin = io::stdin();
        let mut line = String::new();

        loop {
            let prompt = format!("tagfs:{}> ", session.tree_mut().cwd());
            if color {
                print!("{}", prompt.cyan());
            } else {
                print!("{prompt}");
            }
            let _ = io::stdout().flush();

            line.clear();
            if stdin.lock().read_line(&mut line).context(StdinSnafu)? == 0 {
                // EOF; leave the prompt on its own line.
                println!();
                break;
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed == "exit" || trimmed == "quit" {
                break;
            }

            match shell::run(trimmed, session.tree_mut()) {
                Ok(output) => {
                    if !output.is_empty() {
                        println!("{output}");
                    }
                }
                Err(error) => {
                    if color {
                        eprintln!("{}", error.to_string().red());
                    } else {
                        eprintln!("{error}");
                    }
                    continue;
                }
            }
            session.sync().await.context(StoreSnafu)?;
        }

        session.sync().await.context(StoreSnafu)?;
        Ok(())
    }
}

#[derive(Debug, Snafu)]
pub enum ApplicationError {
    #[snafu(display("Critical failure in the backing store"))]
    StoreError { source: FileTreeError },
    #[snafu(display("Command failed"))]
    CommandError { source: ShellError },
    #[snafu(display("Failed to read from stdin"))]
    StdinError { source: io::Error },
}
