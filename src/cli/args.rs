//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// kiln incremental content builder CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Output directory path (relative to project root)
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub output: Option<PathBuf>,

    /// Content directory path (relative to project root)
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub content: Option<PathBuf>,

    /// Config file path (default: kiln.toml)
    #[arg(short = 'C', long, default_value = "kiln.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Build the whole content tree
    #[command(visible_alias = "b")]
    Build {
        #[command(flatten)]
        build_args: BuildArgs,
    },

    /// Build, serve the output and rebuild on changes
    #[command(visible_alias = "s")]
    Serve {
        #[command(flatten)]
        build_args: BuildArgs,

        /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
        #[arg(short, long)]
        interface: Option<std::net::IpAddr>,

        /// Port number to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Enable file watching for auto-rebuild
        #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
        watch: Option<bool>,
    },

    /// Build in memory and print entities with their components
    #[command(visible_alias = "q")]
    Inspect {
        #[command(flatten)]
        args: InspectArgs,
    },
}

/// Shared build arguments for Build and Serve commands
#[derive(clap::Args, Debug, Clone)]
pub struct BuildArgs {
    /// Clean output directory completely before building
    #[arg(short, long)]
    pub clean: bool,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long)]
    pub verbose: bool,
}

/// Inspect command arguments.
#[derive(clap::Args, Debug, Clone)]
pub struct InspectArgs {
    /// Source URL (`/posts/a.md`) or content file path. Omit for all entities.
    pub path: Option<String>,

    /// Preview the rendered output of PATH without writing it
    #[arg(short, long, requires = "path")]
    pub render: bool,

    /// Only list entities carrying error components
    #[arg(short, long)]
    pub errors: bool,

    /// Only list entities carrying all of these components (`output,title`)
    #[arg(long, value_delimiter = ',')]
    pub with: Vec<String>,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve() {
        let cli = Cli::try_parse_from(["kiln", "serve", "--port", "8080", "-w", "false"]).unwrap();
        match cli.command {
            Commands::Serve { port, watch, .. } => {
                assert_eq!(port, Some(8080));
                assert_eq!(watch, Some(false));
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_parse_inspect() {
        let cli = Cli::try_parse_from(["kiln", "inspect", "/a.md", "--render"]).unwrap();
        let Commands::Inspect { args } = cli.command else {
            panic!("expected inspect");
        };
        assert_eq!(args.path.as_deref(), Some("/a.md"));
        assert!(args.render);
        assert!(Cli::try_parse_from(["kiln", "inspect", "--render"]).is_err());

        let cli = Cli::try_parse_from(["kiln", "inspect", "--with", "output,title"]).unwrap();
        let Commands::Inspect { args } = cli.command else {
            panic!("expected inspect");
        };
        assert_eq!(args.with, vec!["output".to_string(), "title".to_string()]);
    }

    #[test]
    fn test_global_overrides() {
        let cli = Cli::try_parse_from(["kiln", "-c", "src", "build", "--clean"]).unwrap();
        assert_eq!(cli.content, Some(PathBuf::from("src")));
        assert!(matches!(cli.command, Commands::Build { .. }));
    }
}
