//! The `new` command: scaffold a starter pipeline app.
//!
//! Generates a directory holding a working pipeline config, a sample input
//! file, and a README, so a first run succeeds before any editing.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};

/// Everything the `new` command needs, mirroring its CLI flags.
#[derive(Debug)]
pub struct NewAppConfig {
    pub name: String,
    pub dir: PathBuf,
    pub force: bool,
}

pub fn scaffold_app(config: NewAppConfig) -> Result<()> {
    let target = config.dir.join(&config.name);

    if target.exists() && !config.force {
        anyhow::bail!(
            "App directory {} already exists. Use --force to overwrite.",
            target.display()
        );
    }

    fs::create_dir_all(&target)
        .with_context(|| format!("Failed to create app directory {}", target.display()))?;

    write_generated(&target, "pipeline.yml", &pipeline_yml(&config.name, &config.dir))?;
    write_generated(&target, "sample_input.txt", &sample_input(&config.name))?;
    write_generated(&target, "README.md", &readme(&config.name, &config.dir))?;

    log::info!("Generated app '{}' at {}", config.name, target.display());
    println!("Created app '{}' at {}", config.name, target.display());
    println!();
    println!("Try it:");
    println!("  stepline inspect {}", target.join("pipeline.yml").display());
    println!("  stepline run {}", target.join("pipeline.yml").display());
    Ok(())
}

fn write_generated(target: &Path, file: &str, contents: &str) -> Result<()> {
    let path = target.join(file);
    fs::write(&path, contents).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Created {}", path.display());
    Ok(())
}

fn app_path(dir: &Path, name: &str, file: &str) -> String {
    dir.join(name).join(file).display().to_string()
}

fn pipeline_yml(name: &str, dir: &Path) -> String {
    let input = app_path(dir, name, "sample_input.txt");
    let output = app_path(dir, name, "output.txt");
    format!(
        r#"pipeline:
  name: {name}
  steps:
    - type: read_file
      path: {input}

    - type: to_uppercase

    - type: split_lines
      skip_empty: true

    - type: grep
      pattern: PIPELINE

    - type: join_lines

    - type: write_file
      path: {output}
"#
    )
}

fn sample_input(name: &str) -> String {
    format!(
        r#"Welcome to the stepline pipeline runner.
This file was generated for app "{name}".
Each line flows through the pipeline steps in order.
Pipelines are declared in YAML and built from registered steps.
Try editing pipeline.yml to rearrange the steps!
"#
    )
}

fn readme(name: &str, dir: &Path) -> String {
    let title = title_case(name);
    let config = app_path(dir, name, "pipeline.yml");
    let output = app_path(dir, name, "output.txt");
    format!(
        r#"# {title}

A stepline app for text processing.

## What It Does

1. **read_file**: Reads the sample input file
2. **to_uppercase**: Uppercases the whole text
3. **split_lines**: Splits it into trimmed, non-empty lines
4. **grep**: Keeps the lines mentioning PIPELINE
5. **join_lines**: Joins the survivors back into text
6. **write_file**: Writes the result to {output}

## Running

Inspect the pipeline without executing:

```bash
stepline inspect {config}
```

Preview what would run:

```bash
stepline run {config} --dry-run
```

Execute it:

```bash
stepline run {config}
```

## Customization

Edit `pipeline.yml` to change the flow:

- Change the `grep` pattern to keep different lines
- Drop the `to_uppercase` step to preserve case
- Point `read_file` at your own input file
- Add `cache:` under an expensive step to reuse its output

Run `stepline steps` to see every available step type.
"#
    )
}

/// `haunted_log` renders as `Haunted Log` in generated docs.
fn title_case(name: &str) -> String {
    name.split(['_', '-'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
