//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DevAddr;

/// Folio markdown documentation builder CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Enable verbose output for debugging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Build the site for production
    #[command(visible_alias = "b")]
    Build {
        #[command(flatten)]
        args: BuildArgs,
    },

    /// Start development server with live reload
    #[command(visible_alias = "s")]
    Serve {
        #[command(flatten)]
        args: ServeArgs,
    },
}

/// `folio build` arguments.
#[derive(clap::Args, Debug, Clone)]
pub struct BuildArgs {
    /// Config file path (default: folio.toml, searched upward)
    #[arg(short = 'f', long, value_hint = clap::ValueHint::FilePath)]
    pub config_file: Option<PathBuf>,

    /// Output directory, overriding `site_dir`
    #[arg(short = 'd', long, value_hint = clap::ValueHint::DirPath)]
    pub site_dir: Option<PathBuf>,
}

/// `folio serve` arguments.
#[derive(clap::Args, Debug, Clone)]
pub struct ServeArgs {
    /// Config file path (default: folio.toml, searched upward)
    #[arg(short = 'f', long, value_hint = clap::ValueHint::FilePath)]
    pub config_file: Option<PathBuf>,

    /// Address to serve on, as host:port (IPv6 as [::1]:8000)
    #[arg(short = 'a', long)]
    pub dev_addr: Option<DevAddr>,

    /// Serve without watching files or live reload
    #[arg(long)]
    pub no_livereload: bool,

    /// Only rebuild pages whose source changed
    #[arg(long, conflicts_with = "clean")]
    pub dirty: bool,

    /// Build as for production, without the live reload script
    #[arg(long)]
    pub clean: bool,

    /// Also watch the theme directory
    #[arg(long)]
    pub watch_theme: bool,

    /// Extra directories or files to watch (repeatable)
    #[arg(short, long, value_hint = clap::ValueHint::AnyPath)]
    pub watch: Vec<PathBuf>,

    /// Open the site in the default browser
    #[arg(short, long)]
    pub open: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("folio").chain(args.iter().copied()))
    }

    #[test]
    fn test_serve_flags() {
        let cli = parse(&[
            "serve",
            "--dev-addr",
            "[::1]:9000",
            "--dirty",
            "-w",
            "snippets",
            "-w",
            "macros",
            "--verbose",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Commands::Serve { args } = cli.command else {
            panic!("expected serve");
        };
        let addr = args.dev_addr.unwrap();
        assert_eq!((addr.host.as_str(), addr.port), ("::1", 9000));
        assert!(args.dirty && !args.clean && !args.no_livereload);
        assert_eq!(args.watch, vec![PathBuf::from("snippets"), PathBuf::from("macros")]);
    }

    #[test]
    fn test_dirty_conflicts_with_clean() {
        assert!(parse(&["serve", "--dirty", "--clean"]).is_err());
    }

    #[test]
    fn test_invalid_dev_addr_rejected() {
        assert!(parse(&["serve", "--dev-addr", "localhost"]).is_err());
    }

    #[test]
    fn test_build_alias() {
        let cli = parse(&["b", "-f", "site/folio.toml"]).unwrap();
        let Commands::Build { args } = cli.command else {
            panic!("expected build");
        };
        assert_eq!(args.config_file, Some(PathBuf::from("site/folio.toml")));
        assert!(args.site_dir.is_none());
    }
}
