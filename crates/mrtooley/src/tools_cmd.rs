// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `mrtooley tools` subcommands.

use std::io::IsTerminal;
use std::str::FromStr;

use clap::Subcommand;
use colored::Colorize;

use mrtooley::App;
use mrtooley_core::{Category, MrTooleyError};
use mrtooley_plugin::{ToolEntry, ToolStatus};

#[derive(Subcommand, Debug)]
pub enum ToolsCommand {
    /// List registered tools.
    List {
        /// Only enabled tools in this category.
        #[arg(long)]
        category: Option<String>,
    },
    /// Search tool names and descriptions.
    Search { query: String },
    /// Enable a tool.
    Enable { name: String },
    /// Disable a tool.
    Disable { name: String },
    /// Run a tool and print its JSON output.
    Run {
        name: String,
        /// JSON input passed to the tool.
        #[arg(long)]
        input: Option<String>,
    },
}

pub async fn run(app: &mut App, command: ToolsCommand) -> Result<(), MrTooleyError> {
    let color = std::io::stdout().is_terminal();
    match command {
        ToolsCommand::List { category } => {
            let registry = app.tools().registry();
            let entries = match category {
                Some(name) => {
                    let category = Category::from_str(&name).map_err(|_| {
                        MrTooleyError::Config(format!("unknown category '{name}'"))
                    })?;
                    registry.get_enabled(category)
                }
                None => registry.list_all(),
            };
            print_entries(&entries, color);
        }
        ToolsCommand::Search { query } => {
            print_entries(&app.tools().registry().search(&query), color);
        }
        ToolsCommand::Enable { name } => {
            app.tools_mut().set_enabled(&name, true).await?;
            println!("{name}: enabled");
        }
        ToolsCommand::Disable { name } => {
            app.tools_mut().set_enabled(&name, false).await?;
            println!("{name}: disabled");
        }
        ToolsCommand::Run { name, input } => {
            let input = match input {
                Some(text) => serde_json::from_str(&text)
                    .map_err(|e| MrTooleyError::Parse(format!("--input is not JSON: {e}")))?,
                None => serde_json::Value::Object(Default::default()),
            };
            let output = app.tools().run(&name, input).await?;
            let text = serde_json::to_string_pretty(&output.content)
                .map_err(|e| MrTooleyError::Internal(e.to_string()))?;
            if output.is_error {
                eprintln!("{text}");
                return Err(MrTooleyError::Tool {
                    message: format!("tool '{name}' reported an error"),
                    source: None,
                });
            }
            println!("{text}");
        }
    }
    Ok(())
}

fn print_entries(entries: &[&ToolEntry], color: bool) {
    if entries.is_empty() {
        println!("no tools");
        return;
    }
    for entry in entries {
        let m = &entry.manifest;
        let status = match (entry.status, color) {
            (ToolStatus::Enabled, true) => "enabled".green().to_string(),
            (ToolStatus::Disabled, true) => "disabled".red().to_string(),
            (status, false) => status.to_string(),
        };
        println!(
            "  {:<16} v{:<3} {:<10} {:<24} {}",
            m.name,
            m.version,
            status,
            m.categories.to_string(),
            m.description
        );
    }
}
