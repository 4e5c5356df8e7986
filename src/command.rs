//! Line-oriented command layer
//!
//! Commands are looked up in a static registry ([`COMMANDS`]) by name or alias, parsed
//! into a [`Command`] and executed against a [`Pipeline`] by a [`Shell`]. The shell reads
//! from any [`AsyncBufRead`] and reports to any [`AsyncWrite`], so the same loop serves
//! an interactive terminal, a command file or a test buffer.
//!
//! ```text
//! telecharge one-piece volume 99 s
//! telecharge demon-slayer chapitre 1-50
//! zip chainsaw-man chapitre 50
//! info one-piece
//! ```

use crate::error::{Error, Result};
use crate::pipeline::Pipeline;
use crate::types::{DownloadOptions, UnitKind, format_number};
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Registry entry describing one command
#[derive(Debug)]
pub struct CommandSpec {
    /// Primary name
    pub name: &'static str,
    /// Alternative names
    pub aliases: &'static [&'static str],
    /// Usage line shown on missing arguments
    pub usage: &'static str,
    /// One-line description for `help`
    pub description: &'static str,
    /// Minimum number of arguments
    pub args_needed: usize,
}

impl CommandSpec {
    /// Whether `word` names this command
    pub fn matches(&self, word: &str) -> bool {
        self.name == word || self.aliases.contains(&word)
    }
}

/// Every command the shell understands
pub static COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "help",
        aliases: &["aide", "h"],
        usage: "help",
        description: "list the available commands",
        args_needed: 0,
    },
    CommandSpec {
        name: "quit",
        aliases: &["q"],
        usage: "quit",
        description: "stop the session",
        args_needed: 0,
    },
    CommandSpec {
        name: "info",
        aliases: &["i"],
        usage: "info <manga>",
        description: "show the number of volumes and chapters of a manga",
        args_needed: 1,
    },
    CommandSpec {
        name: "telecharge",
        aliases: &["t"],
        usage: "telecharge <manga> <volume|vol|v|chapitre|chap|c> <number|start-end> [flags s|f|n]",
        description: "download a volume or chapter and archive it; 's' removes the page \
                      directories afterwards, 'f' downloads again units already on disk, \
                      'n' skips the archive",
        args_needed: 3,
    },
    CommandSpec {
        name: "zip",
        aliases: &["z", "cbr"],
        usage: "zip <manga> <volume|chapitre> <number|start-end>",
        description: "archive a volume or chapter already on disk",
        args_needed: 3,
    },
    CommandSpec {
        name: "fichier",
        aliases: &["f"],
        usage: "fichier <path>",
        description: "run every command of a file, one per line",
        args_needed: 1,
    },
];

/// Registry entry for `word` (case-insensitive)
pub fn lookup(word: &str) -> Option<&'static CommandSpec> {
    let word = word.to_lowercase();
    COMMANDS.iter().find(|spec| spec.matches(&word))
}

/// Text printed by `help`
pub fn help_text() -> String {
    let mut text = String::from("commands:\n");
    for spec in COMMANDS {
        text.push_str(&format!("  {}\n", spec.usage));
        if !spec.aliases.is_empty() {
            text.push_str(&format!("    aliases: {}\n", spec.aliases.join(", ")));
        }
        text.push_str(&format!("    {}\n", spec.description));
    }
    text
}

/// A parsed command line
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Print the command list
    Help,
    /// End the session
    Quit,
    /// Show catalog totals
    Info {
        /// Requested series name
        name: String,
    },
    /// Download units
    Download {
        /// Requested series name
        name: String,
        /// Chapter or volume
        kind: UnitKind,
        /// Number or range token, resolved by the pipeline
        selector: String,
        /// Flags
        options: DownloadOptions,
    },
    /// Archive units already on disk
    Archive {
        /// Requested series name
        name: String,
        /// Chapter or volume
        kind: UnitKind,
        /// Number or range token
        selector: String,
    },
    /// Run the commands of a file
    RunFile {
        /// File to read
        path: PathBuf,
    },
}

/// Parse one input line; blank lines and `#` comments yield `None`
pub fn parse_line(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut words = line.split_whitespace();
    let Some(word) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();
    let spec = lookup(word).ok_or_else(|| Error::UnknownCommand(word.to_string()))?;
    if args.len() < spec.args_needed {
        return Err(Error::MissingArguments {
            usage: spec.usage.to_string(),
        });
    }

    let command = match spec.name {
        "help" => Command::Help,
        "quit" => Command::Quit,
        "info" => Command::Info {
            name: args[0].to_string(),
        },
        "telecharge" => Command::Download {
            name: args[0].to_string(),
            kind: UnitKind::parse(args[1])?,
            selector: args[2].to_lowercase(),
            options: DownloadOptions::from_flags(
                &args.get(3).map(|f| f.to_lowercase()).unwrap_or_default(),
            ),
        },
        "zip" => Command::Archive {
            name: args[0].to_string(),
            kind: UnitKind::parse(args[1])?,
            selector: args[2].to_lowercase(),
        },
        "fichier" => Command::RunFile {
            path: PathBuf::from(args.join(" ")),
        },
        other => return Err(Error::UnknownCommand(other.to_string())),
    };
    Ok(Some(command))
}

/// Whether the session goes on after a command
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    /// Read the next command
    Continue,
    /// End the session
    Quit,
}

type Output<'a> = &'a mut (dyn AsyncWrite + Unpin + Send);

/// Command loop driving a [`Pipeline`]
pub struct Shell {
    pipeline: Pipeline,
}

impl Shell {
    /// Create a shell over `pipeline`
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }

    /// The pipeline commands run against
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Read and execute commands until `quit`, end of input or disconnection
    ///
    /// A failing command is reported on `output` and the loop continues. When the loop
    /// ends the pipeline is shut down. Only failures to read input or write output are
    /// returned.
    pub async fn run<R, W>(&self, input: R, mut output: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        let cancel = self.pipeline.cancellation_token();
        let mut lines = input.lines();

        loop {
            let line = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("session disconnected, leaving command loop");
                    break;
                }
                line = lines.next_line() => line?,
            };
            let Some(line) = line else {
                debug!("end of input");
                break;
            };

            if self.run_line(&line, &mut output).await? == Flow::Quit {
                break;
            }
        }

        output.flush().await?;
        self.pipeline.shutdown().await
    }

    /// Parse and execute one line, reporting its error on `output`
    ///
    /// Only a failure to write the report itself is returned.
    pub async fn run_line(&self, line: &str, output: Output<'_>) -> Result<Flow> {
        let command = match parse_line(line) {
            Ok(Some(command)) => command,
            Ok(None) => return Ok(Flow::Continue),
            Err(e) => {
                report(output, &e).await?;
                return Ok(Flow::Continue);
            }
        };

        match self.execute(command, output).await {
            Ok(flow) => Ok(flow),
            Err(e) => {
                report(output, &e).await?;
                Ok(Flow::Continue)
            }
        }
    }

    /// Execute a parsed command
    pub async fn execute(&self, command: Command, output: Output<'_>) -> Result<Flow> {
        match command {
            Command::Help => {
                output.write_all(help_text().as_bytes()).await?;
            }
            Command::Quit => return Ok(Flow::Quit),
            Command::Info { name } => {
                let stats = self.pipeline.fetch_stats(&name).await?;
                let volumes = plural(stats.volume_count.into(), "volume");
                let chapters = plural(stats.last_chapter_number, "chapter");
                let mut text = format!("{name} has {volumes} and {chapters}\n");
                if stats.canonical_name != name {
                    text.push_str(&format!(
                        "'{name}' is listed as '{}' in the catalog\n",
                        stats.canonical_name
                    ));
                }
                output.write_all(text.as_bytes()).await?;
            }
            Command::Download {
                name,
                kind,
                selector,
                options,
            } => {
                let locations = self
                    .pipeline
                    .download_unit(&name, kind, &selector, options)
                    .await?;
                let mut text = format!("{name} {kind} {selector}: {} unit(s)\n", locations.len());
                for location in &locations {
                    text.push_str(&format!("  {location}\n"));
                }
                output.write_all(text.as_bytes()).await?;
            }
            Command::Archive {
                name,
                kind,
                selector,
            } => {
                let result = self.pipeline.archive_unit(&name, kind, &selector).await?;
                let text = format!(
                    "wrote {} ({} bytes)\n",
                    result.output_path.display(),
                    result.byte_size
                );
                output.write_all(text.as_bytes()).await?;
            }
            Command::RunFile { path } => return Box::pin(self.run_file(path, output)).await,
        }
        Ok(Flow::Continue)
    }

    async fn run_file(&self, path: PathBuf, output: Output<'_>) -> Result<Flow> {
        let contents = tokio::fs::read_to_string(&path).await?;
        info!(path = %path.display(), "running command file");
        for line in contents.lines() {
            if self.pipeline.cancellation_token().is_cancelled() {
                warn!(path = %path.display(), "session disconnected, command file interrupted");
                return Ok(Flow::Quit);
            }
            if self.run_line(line, output).await? == Flow::Quit {
                return Ok(Flow::Quit);
            }
        }
        Ok(Flow::Continue)
    }
}

fn plural(count: f64, word: &str) -> String {
    let s = if count > 1.0 { "s" } else { "" };
    format!("{} {word}{s}", format_number(count))
}

async fn report(output: Output<'_>, error: &Error) -> Result<()> {
    debug!(code = error.error_code(), error = %error, "command failed");
    output
        .write_all(format!("error [{}]: {error}\n", error.error_code()).as_bytes())
        .await?;
    Ok(())
}
