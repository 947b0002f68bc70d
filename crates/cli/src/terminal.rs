//! Terminal rendering of status, answers and notices.

use indicatif::{ProgressBar, ProgressStyle};
use snapprompt_core::{RenderedResponse, UiSink};
use std::io::{self, Write};
use std::time::Duration;
use termimad::crossterm::style::Color;
use termimad::MadSkin;

/// [`UiSink`] that prints to stdout.
///
/// A spinner runs while a request is in flight. Streamed chunks are printed
/// raw as they arrive; a non-streamed answer is rendered as markdown. The
/// overlay toggle mutes and unmutes answer output.
pub struct TerminalSink {
    skin: MadSkin,
    spinner: Option<ProgressBar>,
    visible: bool,
    streamed: bool,
}

impl TerminalSink {
    pub fn new() -> Self {
        let mut skin = MadSkin::default();
        skin.bold.set_fg(Color::Yellow);
        skin.italic.set_fg(Color::Magenta);
        skin.code_block.set_bg(Color::Rgb { r: 40, g: 40, b: 40 });

        Self {
            skin,
            spinner: None,
            visible: true,
            streamed: false,
        }
    }

    fn stop_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    fn start_spinner(&mut self, message: &str) {
        self.stop_spinner();

        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(spinner);
    }
}

impl Default for TerminalSink {
    fn default() -> Self {
        Self::new()
    }
}

impl UiSink for TerminalSink {
    fn on_status_changed(&mut self, status: &str, is_running: bool) {
        if is_running {
            self.streamed = false;
            self.start_spinner(status);
        } else {
            self.stop_spinner();
        }
    }

    fn on_response_rendered(&mut self, response: &RenderedResponse) {
        self.stop_spinner();
        if response.is_error {
            eprintln!("{}", response.markdown);
            return;
        }
        if !self.visible {
            return;
        }

        if self.streamed {
            println!();
        } else {
            println!();
            self.skin.print_text(&response.markdown);
        }
    }

    fn on_chunk(&mut self, text: &str) {
        self.streamed = true;
        if !self.visible {
            return;
        }
        // The first chunk replaces the spinner.
        self.stop_spinner();
        print!("{text}");
        let _ = io::stdout().flush();
    }

    fn on_overlay_visibility(&mut self, visible: bool) {
        self.visible = visible;
        println!("{}", if visible { "(output shown)" } else { "(output hidden)" });
    }

    fn on_notice(&mut self, message: &str) {
        match &self.spinner {
            Some(spinner) => spinner.println(format!("» {message}")),
            None => println!("» {message}"),
        }
    }
}
