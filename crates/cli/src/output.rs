//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use webcompat_harness::cases::CaseResult;
use webcompat_harness::{FrameworkTarget, TargetStatus};

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

impl TableDisplay for FrameworkTarget {
    fn headers() -> Vec<&'static str> {
        vec!["Key", "Host", "Port", "Root", "Health URL", "App Path"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.key.clone(),
            self.host.to_string(),
            self.port.to_string(),
            if self.root_path.is_empty() { "/".to_string() } else { self.root_path.clone() },
            self.health_url(),
            self.app_path.display().to_string(),
        ]
    }
}

impl TableDisplay for TargetStatus {
    fn headers() -> Vec<&'static str> {
        vec!["Key", "Port", "Launches", "Ready"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.target.key.clone(),
            self.target.port.to_string(),
            self.launches.to_string(),
            if self.ready { "yes".green().to_string() } else { "no".red().to_string() },
        ]
    }
}

impl TableDisplay for CaseResult {
    fn headers() -> Vec<&'static str> {
        vec!["Target", "Request", "Result", "Time (ms)", "Error"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.target.clone(),
            format!("{} /Test/{}", self.method, self.name),
            if self.success { "pass".green().to_string() } else { "fail".red().to_string() },
            self.duration_ms.to_string(),
            self.error.clone().unwrap_or_default(),
        ]
    }
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("No items found.");
                return;
            }

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);

            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }

            println!("{table}");
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(items).unwrap_or_default());
        }
    }
}

/// Print one value as a single pretty JSON document
pub fn print_json<T: Serialize>(item: &T) {
    println!("{}", json_document(item));
}

fn json_document<T: Serialize>(item: &T) -> String {
    serde_json::to_string_pretty(item).unwrap_or_default()
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    println!("⚠️  {}", message);
}
