//! The `steps` command: print the registered step catalog.

use anyhow::Result;
use colored::Colorize;

use crate::registry::StepRegistry;

/// Print every registered step identifier with its description, sorted.
pub fn list_steps() -> Result<()> {
    let registry = StepRegistry::with_builtins()?;
    print_catalog(&registry);
    Ok(())
}

fn print_catalog(registry: &StepRegistry) {
    if registry.is_empty() {
        println!("No step types registered.");
        return;
    }

    let width = registry
        .iter()
        .map(|reg| reg.id().len())
        .max()
        .unwrap_or(0);

    println!("Available step types:");
    println!();
    for registration in registry.iter() {
        // Pad before coloring so escape codes do not skew the column.
        let id = format!("{:<width$}", registration.id());
        println!("  {}  {}", id.cyan(), registration.description());
    }
    println!();
    println!("Total: {}", registry.len());
}
