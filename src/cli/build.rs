//! `folio build`: one clean, production-equivalent build into `site_dir`.
//!
//! Hook order matches serve: startup before the build, shutdown after it,
//! the latter also when the build fails.

use anyhow::{Context, Result};

use super::BuildArgs;
use crate::build::build;
use crate::config::ConfigSource;
use crate::hooks::{CommandMode, HookRunner, Plugins};
use crate::log;

pub fn build_site(args: &BuildArgs) -> Result<()> {
    let source = ConfigSource::new(args.config_file.clone(), None, Vec::new());
    let config = source.load(args.site_dir.as_deref())?;
    let plugins = HookRunner::new(&config);

    plugins.on_startup(CommandMode::Build, false)?;

    let built = build(&config, None, false)
        .with_context(|| format!("failed to build {}", config.docs_dir.display()));
    let shutdown = plugins.on_shutdown();

    let report = built?;
    shutdown?;

    log!(
        "build";
        "{} pages, {} files -> {}",
        report.pages,
        report.copied,
        config.site_dir.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("folio.toml"), "site_name = \"Manual\"").unwrap();
        fs::create_dir_all(temp.path().join("docs")).unwrap();
        fs::write(temp.path().join("docs/index.md"), "# Index File\n").unwrap();
        temp
    }

    #[test]
    fn test_build_into_site_dir() {
        let temp = project();
        let args = BuildArgs {
            config_file: Some(temp.path().join("folio.toml")),
            site_dir: None,
        };
        build_site(&args).unwrap();

        let index = fs::read_to_string(temp.path().join("site/index.html")).unwrap();
        assert!(index.contains("<h1>Index File</h1>"));
        assert!(!index.contains("livereload.js"));
    }

    #[test]
    fn test_build_site_dir_override() {
        let temp = project();
        let out = temp.path().join("public");
        let args = BuildArgs {
            config_file: Some(temp.path().join("folio.toml")),
            site_dir: Some(out.clone()),
        };
        build_site(&args).unwrap();
        assert!(out.join("index.html").is_file());
        assert!(!temp.path().join("site").exists());
    }

    #[test]
    fn test_build_missing_docs_fails() {
        let temp = project();
        fs::remove_dir_all(temp.path().join("docs")).unwrap();
        let args = BuildArgs {
            config_file: Some(temp.path().join("folio.toml")),
            site_dir: None,
        };
        assert!(build_site(&args).is_err());
    }
}
