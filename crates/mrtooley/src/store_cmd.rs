// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `mrtooley store` subcommands over the root storage tree.

use clap::Subcommand;

use mrtooley::App;
use mrtooley_core::MrTooleyError;
use mrtooley_storage::{Entry, StorageMapping, parse_cli_value};

#[derive(Subcommand, Debug)]
pub enum StoreCommand {
    /// Print the value or subtree at a path.
    Get { path: String },
    /// Store a value, creating missing parents.
    Set { path: String, value: String },
    /// Remove a value or subtree.
    Rm { path: String },
    /// List the keys of a mapping.
    Ls { path: Option<String> },
}

pub async fn run(app: &App, command: StoreCommand) -> Result<(), MrTooleyError> {
    let root = app.storage();
    match command {
        StoreCommand::Get { path } => print_entry(root, &path).await,
        StoreCommand::Set { path, value } => root.set_deep(&path, parse_cli_value(&value)).await,
        StoreCommand::Rm { path } => root.delete(&path).await,
        StoreCommand::Ls { path } => {
            let mapping = match path.as_deref() {
                None | Some("") => root.clone(),
                Some(path) => root.get_mapping(path).await?,
            };
            list_mapping(&mapping).await
        }
    }
}

/// Prints a value, or a mapping as `key = value` lines.
pub async fn print_entry(mapping: &StorageMapping, path: &str) -> Result<(), MrTooleyError> {
    match mapping.get(path).await? {
        Entry::Value(value) => println!("{value}"),
        Entry::Mapping(m) => list_mapping(&m).await?,
    }
    Ok(())
}

pub async fn list_mapping(mapping: &StorageMapping) -> Result<(), MrTooleyError> {
    for (key, entry) in mapping.items().await? {
        match entry {
            Entry::Value(value) => println!("{key} = {value}"),
            Entry::Mapping(_) => println!("{key}/"),
        }
    }
    Ok(())
}
