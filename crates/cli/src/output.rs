//! CLI output formatting utilities.
//!
//! Provides colored status messages and JSON output for the layer commands.

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

use layerreg_lib::LayerState;
use layerreg_lib::registrar::ReportedEntry;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
  pub const ADD: &str = "+";
  pub const REMOVE: &str = "-";
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message
  );
}

pub fn print_warning(message: &str) {
  println!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stdout, |s| s.yellow()),
    message
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_addition(path: &str) {
  println!(
    "  {} {}",
    symbols::ADD.if_supports_color(Stream::Stdout, |s| s.green()),
    path
  );
}

pub fn print_removal(path: &str) {
  println!(
    "  {} {}",
    symbols::REMOVE.if_supports_color(Stream::Stdout, |s| s.red()),
    path
  );
}

/// One line of a layer listing: position, state, path, and a marker for this layer.
pub fn format_layer(layer: &ReportedEntry) -> String {
  let marker = if layer.owned { symbols::ARROW } else { " " };
  let state = match layer.state {
    LayerState::Enabled => "enabled ",
    LayerState::Disabled => "disabled",
  };
  format!("{} {:>3}  {}  {}", marker, layer.position + 1, state, layer.entry.manifest_path)
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}
