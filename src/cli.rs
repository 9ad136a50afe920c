use clap::{Parser, Subcommand};

use crate::config::{Config, ReleaseVersion, parse_release};
use crate::error::Result;

#[derive(Parser, Debug)]
#[command(name = "zipfs")]
#[command(version)]
#[command(about = "Browse and edit ZIP archives as a file system", long_about = None)]
#[command(after_help = "Examples:\n  \
  zipfs app.jar ls -l /META-INF          list a directory with sizes\n  \
  zipfs --create out.zip put notes.txt /docs/notes.txt\n  \
  zipfs --release 11 app.jar cat /a/B.class   read the member serving release 11")]
pub struct Cli {
    /// ZIP archive to operate on
    #[arg(value_name = "ARCHIVE")]
    pub archive: String,

    #[command(subcommand)]
    pub command: Command,

    /// Create the archive if it does not exist
    #[arg(long, global = true)]
    pub create: bool,

    /// Store new entries without compression
    #[arg(long, global = true)]
    pub no_compression: bool,

    /// Stage written content in temporary files instead of memory
    #[arg(long = "temp-file", global = true)]
    pub temp_file: bool,

    /// Always write the ZIP64 end records
    #[arg(long = "force-zip64", global = true)]
    pub force_zip64: bool,

    /// Resolve multi-release entries for VERSION ("runtime" or a number)
    #[arg(long, value_name = "VERSION", global = true)]
    pub release: Option<String>,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count, global = true)]
    pub quiet: u8,

    /// More log output (-vv => trace)
    #[arg(short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List a directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
        /// Show size, method and modification time
        #[arg(short = 'l')]
        long: bool,
    },
    /// Print an entry to stdout
    Cat { path: String },
    /// Copy a local file into the archive
    Put { src: String, dest: String },
    /// Create a directory
    Mkdir { path: String },
    /// Delete an entry or an empty directory
    Rm { path: String },
    /// Rename an entry
    Mv {
        src: String,
        dest: String,
        /// Replace an existing destination
        #[arg(short = 'f')]
        force: bool,
    },
    /// Copy an entry within the archive
    Cp {
        src: String,
        dest: String,
        /// Replace an existing destination
        #[arg(short = 'f')]
        force: bool,
    },
    /// Show the metadata of an entry
    Stat { path: String },
}

impl Cli {
    /// True for commands that change the archive
    pub fn is_mutating(&self) -> bool {
        !matches!(
            self.command,
            Command::Ls { .. } | Command::Cat { .. } | Command::Stat { .. }
        )
    }

    /// Archive options selected on the command line.
    pub fn config(&self) -> Result<Config> {
        let mut config = Config::new()
            .create(self.create)
            .no_compression(self.no_compression)
            .use_temp_file(self.temp_file)
            .force_zip64_end(self.force_zip64)
            .read_only(!self.is_mutating());
        if let Some(value) = &self.release {
            let version: ReleaseVersion = parse_release("release", value)?;
            config = config.release_version(version);
        }
        Ok(config)
    }

    /// Default log filter for the -q/-v counts
    pub fn log_filter(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (q, _) if q > 1 => "off",
            (1, _) => "error",
            (_, 0) => "warn",
            (_, 1) => "info",
            (_, 2) => "debug",
            _ => "trace",
        }
    }
}
