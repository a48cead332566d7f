// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Small demonstration tool over the firmware variable crates: list
//! variables, inspect boot entries, and pick the option for the next boot.
//!
//! Touching firmware variables needs OS privileges; the tool does not elevate
//! and simply reports the resulting error when run without them.

use anyhow::Context;
use anyhow::Result;
use clap::ArgGroup;
use clap::Parser;
use efivar_storage::VariableStore;
use efivar_vars::boot;
use efivar_vars::boot_entries;
use efivar_vars::BOOT_NEXT;
use efivar_vars::BOOT_ORDER;

#[derive(Parser)]
#[clap(name = "efivartool", about = "Inspect and adjust UEFI firmware variables.")]
#[clap(group(ArgGroup::new("action").required(true)))]
struct Options {
    /// List every firmware variable with its vendor identifier and size.
    #[clap(long, group = "action")]
    list_all: bool,

    /// List the configured Boot#### entries.
    #[clap(long, group = "action")]
    list_boot: bool,

    /// List the boot order with each entry resolved.
    #[clap(long, group = "action")]
    list_boot_order: bool,

    /// Set the boot option for the next boot to the value of --next.
    #[clap(long, group = "action", requires = "next")]
    set_next: bool,

    /// Boot entry index used by --set-next.
    #[clap(long, value_name = "N")]
    next: Option<u16>,
}

#[cfg(windows)]
fn default_store() -> Box<dyn VariableStore> {
    Box::new(efivar_storage::WinApiStore::system())
}

#[cfg(not(windows))]
fn default_store() -> Box<dyn VariableStore> {
    Box::new(efivar_storage::EfivarFs::at_default_mount())
}

fn list_all(store: &dyn VariableStore) -> Result<()> {
    let mut names = store.variable_names()?;

    for item in names.by_ref() {
        match store.size_hint(&item.name, item.vendor) {
            Ok(size) => println!("{} {} {size}", item.vendor.braced(), item.name),
            Err(err) => println!("{} {} ({err})", item.vendor.braced(), item.name),
        }
    }

    if let Some(err) = names.err() {
        anyhow::bail!("enumeration failed: {err}");
    }
    Ok(())
}

fn list_boot(store: &dyn VariableStore) -> Result<()> {
    let mut entries = boot_entries(store)?;

    for entry in entries.by_ref() {
        let (attrs, option) = entry
            .variable
            .get(store)
            .with_context(|| format!("entry {:04X}", entry.index))?;

        println!("Boot{:04X}: {}", entry.index, option.description_string());
        println!("    variable attributes: {attrs}");
        println!("    option attributes:   {}", option.attributes);
        for path in option.file_path_list.all_text() {
            println!("    path: {path}");
        }
        if !option.optional_data.is_empty() {
            println!("    optional data: {} bytes", option.optional_data.len());
        }
    }

    if let Some(err) = entries.err() {
        anyhow::bail!("enumeration failed: {err}");
    }
    Ok(())
}

fn list_boot_order(store: &dyn VariableStore) -> Result<()> {
    let (_, order) = BOOT_ORDER.get(store).context("reading BootOrder")?;

    for (position, index) in order.iter().enumerate() {
        let (_, option) = boot(*index)
            .get(store)
            .with_context(|| format!("entry {position} (Boot{index:04X})"))?;

        println!(
            "{position}: Boot{index:04X} {}",
            option.description_string()
        );
        for path in option.file_path_list.all_text() {
            println!("    path: {path}");
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let opts = Options::parse();
    let store = default_store();

    if opts.list_all {
        list_all(&*store)
    } else if opts.list_boot {
        list_boot(&*store)
    } else if opts.list_boot_order {
        list_boot_order(&*store)
    } else if opts.set_next {
        let next = opts.next.context("--next is required with --set-next")?;
        BOOT_NEXT
            .set(&*store, &next)
            .with_context(|| format!("setting BootNext to {next:04X}"))?;
        println!("BootNext = Boot{next:04X}");
        Ok(())
    } else {
        unreachable!("clap enforces one action");
    }
}
