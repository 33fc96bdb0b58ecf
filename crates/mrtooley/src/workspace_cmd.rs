// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `mrtooley workspace` subcommands.

use clap::Subcommand;

use mrtooley::App;
use mrtooley_core::MrTooleyError;
use mrtooley_storage::{parse_assignment, parse_cli_value};

use crate::store_cmd::print_entry;

#[derive(Subcommand, Debug)]
pub enum WorkspaceCommand {
    /// List workspaces with their mounts.
    List,
    /// Create an empty workspace.
    Create { name: String },
    /// Remove a workspace and the mounts pointing at it.
    Remove { name: String },
    /// Mount workspace TARGET at KEY inside NAME.
    Mount {
        name: String,
        key: String,
        target: String,
    },
    /// Remove the mount at KEY inside NAME.
    Unmount { name: String, key: String },
    /// Print the value at `@name/path` (`@/path` is the default workspace).
    Get { address: String },
    /// Store a value: `@name/path=value`.
    Set { assignment: String },
}

pub async fn run(app: &App, command: WorkspaceCommand) -> Result<(), MrTooleyError> {
    let manager = app.workspaces();
    match command {
        WorkspaceCommand::List => {
            for name in manager.list().await? {
                let ws = manager.open(&name).await?;
                let mounts = ws.mounts().await?;
                if mounts.is_empty() {
                    println!("{name}");
                } else {
                    let mounts: Vec<String> = mounts
                        .iter()
                        .map(|(key, target)| format!("{key} -> {target}"))
                        .collect();
                    println!("{name} [{}]", mounts.join(", "));
                }
            }
        }
        WorkspaceCommand::Create { name } => {
            manager.create(&name).await?;
            println!("created workspace '{name}'");
        }
        WorkspaceCommand::Remove { name } => {
            manager.remove(&name).await?;
            println!("removed workspace '{name}'");
        }
        WorkspaceCommand::Mount { name, key, target } => {
            manager.mount(&name, &key, &target).await?;
        }
        WorkspaceCommand::Unmount { name, key } => {
            manager.unmount(&name, &key).await?;
        }
        WorkspaceCommand::Get { address } => {
            let (mapping, rest) = manager.resolve(&address).await?;
            print_entry(&mapping, &rest).await?;
        }
        WorkspaceCommand::Set { assignment } => {
            let (address, raw) = parse_assignment(&assignment)?;
            let (mapping, rest) = manager.resolve(address).await?;
            mapping.set_deep(&rest, parse_cli_value(raw)).await?;
        }
    }
    Ok(())
}
