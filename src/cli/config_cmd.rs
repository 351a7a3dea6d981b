//! Config command - show, create or locate the config file

use clap::{Args, Subcommand};

use crate::config::Config;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Write the example config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the config file path
    Path,
}

pub async fn run(args: ConfigArgs, config: &Config) -> anyhow::Result<()> {
    let path = Config::config_path();

    match args.command {
        ConfigCommands::Show => {
            let origin = if path.exists() { "" } else { " (not found, using defaults)" };
            println!("# {}{}", path.display(), origin);
            print!("{}", toml::to_string(&config.redacted())?);
        }
        ConfigCommands::Init { force } => {
            if !Config::write_example(&path, force)? {
                anyhow::bail!("{} already exists; use --force to overwrite", path.display());
            }
            println!("Wrote {}", path.display());
        }
        ConfigCommands::Path => println!("{}", path.display()),
    }

    Ok(())
}
