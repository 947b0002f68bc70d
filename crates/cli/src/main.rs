mod hotkey;
mod terminal;

use anyhow::{bail, Context, Result};
use clap::Parser;
use hotkey::RdevHotkeys;
use snapprompt_core::hotkey::prompt_hotkeys;
use snapprompt_core::{init, Assistant, ProviderName, ScreenCapturer, SettingsStore};
use std::path::PathBuf;
use terminal::TerminalSink;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// List available monitors and exit
    #[arg(long)]
    list_monitors: bool,

    /// Capture once with the current prompt, print the answer and exit
    #[arg(long)]
    once: bool,

    /// Switch the AI provider (gemini or gpt); the choice is saved
    #[arg(short, long)]
    provider: Option<String>,

    /// Use this settings file instead of the default location
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    init();
    init_logging();
    let args = Args::parse();

    // Handle --list-monitors
    if args.list_monitors {
        let capturer = ScreenCapturer::new().context("Failed to initialize screen capturer")?;
        println!("Available monitors:");
        for info in capturer.list_screen() {
            println!("{}", info);
        }
        return Ok(());
    }

    let mut settings = match &args.config {
        Some(path) => SettingsStore::load_from(path),
        None => SettingsStore::load(),
    };
    if let Some(name) = &args.provider {
        let provider: ProviderName = name.parse()?;
        settings
            .set("provider", provider.as_str())
            .context("Failed to save provider choice")?;
    }

    let mut app = Assistant::new(settings, Box::new(TerminalSink::new()))
        .context("Failed to start. Try --list-monitors to check the configured monitor")?;
    if let Some(monitor) = app.list_monitors().get(app.settings().monitor()) {
        info!("Capturing {monitor}");
    }

    if args.once {
        app.run_once();
        return Ok(());
    }

    let mut hotkeys = RdevHotkeys::default();
    if app.bind_hotkeys(&mut hotkeys) == 0 {
        bail!("No hotkey could be registered, check the hotkeys section of the settings");
    }
    print_bindings(app.settings());
    let _listener = hotkeys.start(app.events())?;

    app.run();
    info!("bye");
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_bindings(settings: &SettingsStore) {
    let controls = [
        ("send_prompt", "send screenshot with current prompt"),
        ("screenshot_only", "save screenshot to history"),
        ("clear_screenshots", "clear screenshot history"),
        ("switch_provider", "switch provider"),
        ("toggle", "show/hide answers"),
    ];

    println!("snapprompt is listening ({}):", settings.provider_name());
    for (name, action) in controls {
        let combo = settings.hotkey(name);
        if !combo.is_empty() {
            println!("  {combo:<12} {action}");
        }
    }
    for (combo, prompt) in prompt_hotkeys(settings) {
        println!("  {combo:<12} use prompt \"{}\"", prompt.name);
    }
}
