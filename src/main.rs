//! keydial - Huion KD100 remapping daemon
//!
//! Reads the key dial through hidapi and turns button presses and wheel
//! turns into xdotool key, mouse and command actions.

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use keydial::config::Configuration;
use keydial::daemon::{Daemon, DaemonOptions, ProfileWatcher};
use keydial::device::{self, HidTransport};
use keydial::dispatch::Dispatcher;
use keydial::display_backend::{DisplayBackend, WindowInfo};
use keydial::osd::{NullOsd, OsdHandle, OsdNotifier};
use keydial::profile::ProfileSet;
use keydial::resolver::ProfileEngine;
use keydial::sink::{ActionSink, LogSink, XdotoolSink};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "keydial", about = "Remapping daemon for the Huion KD100 key dial", version)]
struct Cli {
    /// Config file (default: ~/.config/keydial/config.toml)
    #[arg(short, long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// More logging; repeat for trace output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    debug: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the daemon (default)
    Run(RunArgs),
    /// Load and validate the configuration and profiles, then exit
    Check,
    /// List loaded profiles
    Profiles,
    /// Show which profile a window would select
    Match {
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        class: Option<String>,
        #[arg(long)]
        instance: Option<String>,
    },
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Log actions instead of performing them
    #[arg(long)]
    dry_run: bool,

    /// Ignore profiles and use the base configuration only
    #[arg(long, conflicts_with = "profile")]
    no_profiles: bool,

    /// Activate this profile and disable automatic switching
    #[arg(long, value_name = "NAME")]
    profile: Option<String>,
}

fn init_logging(debug: u8) {
    let level = match debug {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(cli: &Cli) -> Result<Configuration> {
    let path = Configuration::locate(cli.config.as_deref())?;
    Configuration::load(&path).with_context(|| format!("Failed to load config {:?}", path))
}

/// Load profiles, falling back to none on error
fn load_profiles_lenient(config: &Configuration) -> ProfileSet {
    let dir = config.profile_dir();
    match ProfileSet::load_dir(&dir) {
        Ok(set) => set,
        Err(e) => {
            error!("Failed to load profiles from {:?}: {}", dir, e);
            ProfileSet::default()
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    match &cli.command {
        None => run(&cli, &RunArgs::default()),
        Some(Command::Run(args)) => run(&cli, args),
        Some(Command::Check) => check(&cli),
        Some(Command::Profiles) => list_profiles(&cli),
        Some(Command::Match {
            title,
            class,
            instance,
        }) => match_window(
            &cli,
            WindowInfo::new(title.as_deref(), class.as_deref(), instance.as_deref()),
        ),
    }
}

fn run(cli: &Cli, args: &RunArgs) -> Result<()> {
    info!("keydial {} starting...", env!("CARGO_PKG_VERSION"));

    let config = load_config(cli)?;

    if !config.device.enable_uclogic && device::kernel_module_loaded("hid_uclogic") {
        warn!("hid_uclogic is loaded and may grab the dial; unload it or set device.enable_uclogic");
    }

    let stop = Arc::new(AtomicBool::new(false));
    let stop_handler = stop.clone();
    ctrlc::set_handler(move || {
        stop_handler.store(true, Ordering::Relaxed);
    })
    .context("Failed to set Ctrl-C handler")?;

    let profiles = if args.no_profiles {
        ProfileSet::default()
    } else {
        load_profiles_lenient(&config)
    };
    let auto_switch = config.profiles.auto_switch && args.profile.is_none();

    let sink: Box<dyn ActionSink> = if args.dry_run {
        info!("Dry run: actions are logged, not performed");
        Box::new(LogSink)
    } else {
        if !XdotoolSink::probe() {
            warn!("xdotool is not available; key and mouse actions will fail");
        }
        Box::new(XdotoolSink::new())
    };

    let osd_handle = config
        .osd
        .enabled
        .then(|| OsdHandle::start(config.osd.recent_actions));
    let osd: Box<dyn OsdNotifier> = match &osd_handle {
        Some(handle) => Box::new(handle.notifier()),
        None => Box::new(NullOsd),
    };

    let options = DaemonOptions {
        profile_interval: config.profiles.check_interval(),
        ..DaemonOptions::default()
    };
    let transport = HidTransport::new(config.device.vendor_id, config.device.product_id);

    let base = Arc::new(config);
    let mut engine = ProfileEngine::new(base, profiles);
    if let Some(name) = &args.profile {
        pin_profile(&mut engine, name)?;
    }
    let dispatcher = Dispatcher::new(engine.effective(), sink, osd);

    let mut daemon = Daemon::new(transport, dispatcher, stop).with_options(options);
    if auto_switch && !engine.profiles().is_empty() {
        let query = DisplayBackend::new().create_window_query();
        daemon = daemon.with_profiles(ProfileWatcher::new(engine, query));
    }

    daemon.run()?;

    if let Some(handle) = osd_handle {
        handle.shutdown();
    }
    Ok(())
}

/// Make `name` the active profile before the daemon starts
fn pin_profile(engine: &mut ProfileEngine, name: &str) -> Result<()> {
    if engine.profiles().position(name).is_none() {
        bail!("No profile named '{}'", name);
    }
    if engine.switch_to(name).is_some() {
        info!("Using profile '{}'; automatic switching is off", name);
    }
    Ok(())
}

fn check(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let dir = config.profile_dir();
    let profiles = ProfileSet::load_dir(&dir)
        .with_context(|| format!("Failed to load profiles from {:?}", dir))?;

    let registry = &config.registry;
    println!("Config OK");
    println!(
        "  device:    {:04x}:{:04x}",
        config.device.vendor_id, config.device.product_id
    );
    println!("  buttons:   {}", registry.buttons().count());
    println!("  wheel:     {} slot(s), {:?} mode", registry.wheel_count(), config.wheel_mode.mode);
    match config.leader.button {
        Some(index) => println!(
            "  leader:    button {} prefix '{}' ({:?}, {} ms)",
            index, config.leader.prefix, config.leader.mode, config.leader.timeout_ms
        ),
        None => println!("  leader:    none"),
    }
    println!("  profiles:  {} in {:?}", profiles.len(), dir);
    Ok(())
}

fn list_profiles(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let dir = config.profile_dir();
    let profiles = ProfileSet::load_dir(&dir)
        .with_context(|| format!("Failed to load profiles from {:?}", dir))?;

    if profiles.is_empty() {
        println!("No profiles in {:?}", dir);
        return Ok(());
    }
    for profile in profiles.iter() {
        println!(
            "{:<20} pattern={:<24} priority={:<4}{}",
            profile.name,
            profile.window_pattern,
            profile.priority,
            if profile.is_default { " (default)" } else { "" }
        );
    }
    Ok(())
}

fn match_window(cli: &Cli, window: WindowInfo) -> Result<()> {
    let config = load_config(cli)?;
    let dir = config.profile_dir();
    let profiles = ProfileSet::load_dir(&dir)
        .with_context(|| format!("Failed to load profiles from {:?}", dir))?;

    let window = if window == WindowInfo::default() {
        DisplayBackend::new()
            .create_window_query()
            .current_window()
            .context("No window given and the focused window is unknown")?
    } else {
        window
    };

    let engine = ProfileEngine::new(Arc::new(config), profiles);
    println!(
        "Window: title={:?} class={:?} instance={:?}",
        window.title, window.class, window.instance
    );
    match engine.select(&window).and_then(|i| engine.profiles().get(i)) {
        Some(profile) => println!("Profile: {}", profile.name),
        None => println!("Profile: none (current profile stays active)"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use keydial::profile::Profile;

    fn engine() -> ProfileEngine {
        let profiles = ProfileSet::new(vec![
            Profile::new("Krita", "*krita*", 10),
            Profile::new("GIMP", "gimp*", 0),
        ])
        .unwrap();
        ProfileEngine::new(Arc::new(Configuration::default()), profiles)
    }

    #[test]
    fn test_run_profile_flag() {
        let cli = Cli::try_parse_from(["keydial", "run", "--profile", "Krita"]).unwrap();
        match cli.command {
            Some(Command::Run(args)) => assert_eq!(args.profile.as_deref(), Some("Krita")),
            other => panic!("unexpected command {:?}", other),
        }
        assert!(Cli::try_parse_from(["keydial", "run", "--profile", "Krita", "--no-profiles"]).is_err());
    }

    #[test]
    fn test_pin_profile() {
        let mut engine = engine();
        pin_profile(&mut engine, "GIMP").unwrap();
        assert_eq!(engine.active().map(|p| p.name.as_str()), Some("GIMP"));
        assert_eq!(engine.effective().profile.as_deref(), Some("GIMP"));

        assert!(pin_profile(&mut engine, "Inkscape").is_err());
        assert_eq!(engine.active().map(|p| p.name.as_str()), Some("GIMP"));
    }
}
