// SPDX-License-Identifier: MPL-2.0

use clap::Parser;
use eyre::WrapErr;
use otousan_config::{Config, RingerSource};
use otousan_lib::WaylandHost;
use std::path::PathBuf;
use tracing_subscriber::prelude::*;

/// Otousan - a live wallpaper that looks where you touch and talks when tapped
#[derive(Parser, Debug)]
#[command(name = "otousan")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Read configuration from this file instead of the user config
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory holding the images and voice clips
    #[arg(long, value_name = "DIR")]
    assets: Option<PathBuf>,

    /// Where to read the ringer mode from: feedbackd, normal or silent
    #[arg(long)]
    ringer: Option<RingerSource>,

    /// Write the effective configuration and exit
    #[arg(long)]
    write_config: bool,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    if std::env::var("RUST_SPANTRACE").is_err() {
        unsafe {
            std::env::set_var("RUST_SPANTRACE", "0");
        }
    }

    init_logger();

    let args = Args::parse();
    let config = apply_overrides(load_config(args.config.as_deref()), &args);

    if args.write_config {
        return write_config(&config, args.config.as_deref());
    }

    WaylandHost::run(&config)?;

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Config {
    let loaded = match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };

    loaded.unwrap_or_else(|why| {
        tracing::error!(?why, "Config file error, falling back to defaults");
        Config::default()
    })
}

fn apply_overrides(mut config: Config, args: &Args) -> Config {
    if let Some(assets) = &args.assets {
        config = config.with_assets(assets.clone());
    }

    if let Some(ringer) = args.ringer {
        config = config.with_ringer(ringer);
    }

    config
}

fn write_config(config: &Config, path: Option<&std::path::Path>) -> color_eyre::Result<()> {
    let path = match path {
        Some(path) => {
            config.save_to(path)?;
            path.to_owned()
        }
        None => config.save().wrap_err("failed to write user config")?,
    };

    tracing::info!(path = %path.display(), "wrote config");
    println!("{}", path.display());
    Ok(())
}

fn init_logger() {
    let log_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|level| level.parse::<tracing::Level>().ok())
        .unwrap_or(tracing::Level::INFO);

    let log_format = tracing_subscriber::fmt::format()
        .pretty()
        .without_time()
        .with_line_number(true)
        .with_file(true)
        .with_target(false)
        .with_thread_names(true);

    let log_filter = tracing_subscriber::fmt::Layer::default()
        .with_writer(std::io::stderr)
        .event_format(log_format)
        .with_filter(tracing_subscriber::filter::filter_fn(move |metadata| {
            metadata.level() == &tracing::Level::ERROR
                || (metadata.target().starts_with("otousan") && metadata.level() <= &log_level)
        }));

    tracing_subscriber::registry().with(log_filter).init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_loaded_values() {
        let args = Args::parse_from([
            "otousan",
            "--assets",
            "/srv/otousan",
            "--ringer",
            "silent",
        ]);

        let config = apply_overrides(Config::default().with_volume(0.5), &args);

        assert_eq!(config.assets, PathBuf::from("/srv/otousan"));
        assert_eq!(config.ringer, RingerSource::Silent);
        assert_eq!(config.volume, 0.5);
    }

    #[test]
    fn no_overrides_keep_the_config() {
        let args = Args::parse_from(["otousan"]);
        let config = Config::default().with_ringer(RingerSource::Normal);

        assert_eq!(apply_overrides(config.clone(), &args), config);
        assert!(!args.write_config);
    }

    #[test]
    fn unknown_ringer_is_rejected() {
        assert!(Args::try_parse_from(["otousan", "--ringer", "loud"]).is_err());
    }

    #[test]
    fn broken_config_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join(format!("otousan-main-{}.ron", std::process::id()));
        std::fs::write(&path, "(volume: ").unwrap();

        assert_eq!(load_config(Some(path.as_path())), Config::default());

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn write_config_round_trips() {
        let path = std::env::temp_dir()
            .join(format!("otousan-main-write-{}", std::process::id()))
            .join("config.ron");
        let config = Config::default().with_ringer(RingerSource::Silent);

        write_config(&config, Some(path.as_path())).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }
}
