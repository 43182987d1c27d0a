//! Command-line interface for modelshelf.
//!
//! Provides commands for scanning the models folder, fetching files from
//! the hub, inspecting and annotating artifacts, and managing settings.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::{Settings, CONFIG_ENV, HUB_ENDPOINT_ENV};
use crate::core::Orchestrator;
use crate::domain::{format_size, Artifact, TransferProgress, TransferStatus};
use crate::library::{hash_file, DocumentLookup, MetadataStore};

/// modelshelf - Local mirror of model artifacts
#[derive(Parser, Debug)]
#[command(name = "modelshelf")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Settings file (defaults to ~/.modelshelf/data/config.json)
    #[arg(long, global = true, env = CONFIG_ENV)]
    pub config: Option<PathBuf>,

    /// Hub base URL
    #[arg(long, global = true, env = HUB_ENDPOINT_ENV)]
    pub hub_endpoint: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List artifacts under the models folder
    Scan {
        /// Only show this category
        #[arg(short, long)]
        category: Option<String>,

        /// Only show this group
        #[arg(short, long)]
        group: Option<String>,
    },

    /// Fetch a file from the hub into <category>/<group>
    Download {
        /// Repository id (e.g. "user/repo")
        repo: String,

        /// File name inside the repository
        filename: String,

        /// Target category (defaults to the first configured one)
        #[arg(short, long)]
        category: Option<String>,

        /// Target group (defaults to the first configured one)
        #[arg(short, long)]
        group: Option<String>,
    },

    /// Show details of an artifact
    Show {
        /// Logical path (e.g. "checkpoints/SDXL/model.safetensors")
        logical_path: String,
    },

    /// Attach a preview image to an artifact
    Preview {
        logical_path: String,

        /// Image file to import
        image: PathBuf,
    },

    /// Replace the notes of an artifact
    Notes {
        logical_path: String,

        /// Note text (leading and trailing whitespace is dropped)
        text: String,
    },

    /// Delete an artifact file and its record
    Delete {
        logical_path: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Print the SHA-256 digest of a file
    Hash {
        path: PathBuf,
    },

    /// Show or change settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show resolved configuration
    Show,

    /// Set the models folder to scan
    SetRoot {
        dir: PathBuf,

        /// Also move the application data folder
        #[arg(long)]
        app_data: Option<PathBuf>,
    },

    /// Set the hub access token (empty string clears it)
    SetToken {
        token: String,
    },
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let settings = Settings::resolve(self.config, self.hub_endpoint);

        match self.command {
            Commands::Scan { category, group } => list_artifacts(&settings, category, group).await,
            Commands::Download {
                repo,
                filename,
                category,
                group,
            } => download(&settings, &repo, &filename, category, group).await,
            Commands::Show { logical_path } => show_artifact(&settings, &logical_path).await,
            Commands::Preview {
                logical_path,
                image,
            } => import_preview(&settings, &logical_path, image).await,
            Commands::Notes { logical_path, text } => {
                save_notes(&settings, &logical_path, &text).await
            }
            Commands::Delete { logical_path, yes } => {
                delete_artifact(&settings, &logical_path, yes).await
            }
            Commands::Hash { path } => {
                let digest = hash_file(&path)
                    .await
                    .with_context(|| format!("Failed to hash {}", path.display()))?;
                println!("{}  {}", digest, path.display());
                Ok(())
            }
            Commands::Config { command } => execute_config(&settings, command).await,
        }
    }
}

/// List artifacts, optionally filtered
async fn list_artifacts(
    settings: &Settings,
    category: Option<String>,
    group: Option<String>,
) -> Result<()> {
    let orchestrator = Orchestrator::open(settings).await?;

    let Some(root) = orchestrator.store().document().models_root() else {
        anyhow::bail!("Models folder is not configured. Run `modelshelf config set-root <dir>`");
    };

    let catalog = orchestrator.catalog();
    let artifacts: Vec<&Artifact> = catalog
        .artifacts
        .iter()
        .filter(|a| category.as_deref().map_or(true, |c| a.category == c))
        .filter(|a| group.as_deref().map_or(true, |g| a.group == g))
        .collect();

    if artifacts.is_empty() {
        println!("No artifacts found under {}", root.display());
        return Ok(());
    }

    println!(
        "{:<16} {:<16} {:<40} {:>10}  {}",
        "CATEGORY", "GROUP", "NAME", "SIZE", "ORIGIN"
    );
    println!("{}", "-".repeat(100));

    for artifact in &artifacts {
        let origin = if artifact.origin_repo.is_empty() {
            "-"
        } else {
            artifact.origin_repo.as_str()
        };
        println!(
            "{:<16} {:<16} {:<40} {:>10}  {}",
            artifact.category,
            artifact.group,
            truncate(&artifact.name, 40),
            artifact.display_size(),
            origin
        );
    }

    println!("\n{} artifact(s)", artifacts.len());
    if catalog.skipped > 0 {
        eprintln!("[{} entries could not be read]", catalog.skipped);
    }

    Ok(())
}

/// Fetch one file, printing progress to stderr; Ctrl-C cancels
async fn download(
    settings: &Settings,
    repo: &str,
    filename: &str,
    category: Option<String>,
    group: Option<String>,
) -> Result<()> {
    let mut orchestrator = Orchestrator::open(settings).await?;

    let document = orchestrator.store().document();
    let category = category
        .or_else(|| document.categories.first().map(|c| c.id.clone()))
        .context("No categories configured")?;
    let group = group
        .or_else(|| document.base_groups.first().cloned())
        .context("No groups configured")?;

    let request = orchestrator.prepare_download(repo, filename, &category, &group)?;
    let target = request.target_path();

    let cancel = orchestrator.cancel_handle();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    eprintln!("Fetching {}/{} -> {}", repo, filename, target.display());
    let outcome = orchestrator.download(request, print_progress).await;
    ctrl_c.abort();
    eprintln!();

    let outcome = outcome?;
    match outcome.status {
        TransferStatus::Completed => {
            println!("Saved {}", target.display());
            if let Some(document) = &outcome.document_path {
                println!("Document: {}", document.display());
            }
            Ok(())
        }
        TransferStatus::Cancelled => {
            eprintln!("[Download cancelled]");
            std::process::exit(130);
        }
        TransferStatus::Failed => {
            eprintln!("[Download failed: {}]", outcome.message);
            std::process::exit(1);
        }
    }
}

fn print_progress(progress: &TransferProgress) {
    let speed = format_size(progress.speed as u64);
    let line = match progress.fraction() {
        Some(fraction) => format!(
            "\r{:>3.0}% {}/{} {}/s   ",
            fraction * 100.0,
            format_size(progress.downloaded),
            format_size(progress.total),
            speed
        ),
        None => format!("\r{} {}/s   ", format_size(progress.downloaded), speed),
    };

    let mut stderr = io::stderr();
    let _ = stderr.write_all(line.as_bytes());
    let _ = stderr.flush();
}

/// Show artifact details, notes and the companion document
async fn show_artifact(settings: &Settings, logical_path: &str) -> Result<()> {
    let orchestrator = Orchestrator::open(settings).await?;
    let artifact = find_artifact(&orchestrator, logical_path)?;

    println!("Name:     {}", artifact.name);
    println!("Path:     {}", artifact.absolute_path.display());
    println!("Size:     {}", artifact.display_size());
    println!("Category: {}", artifact.category);
    println!("Group:    {}", artifact.group);
    if !artifact.origin_repo.is_empty() {
        println!("Origin:   {}/{}", artifact.origin_repo, artifact.origin_filename);
    }
    if !artifact.preview_path.is_empty() {
        println!("Preview:  {}", artifact.preview_path);
    }
    if let Some(record) = orchestrator.store().record(logical_path) {
        if let Some(created_at) = &record.created_at {
            println!("Added:    {}", created_at);
        }
    }

    if !artifact.notes.is_empty() {
        println!("\n## Notes\n\n{}", artifact.notes);
    }

    match orchestrator.document_for(artifact) {
        DocumentLookup::Found(path) => {
            let text = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            println!("\n## Document ({})\n\n{}", path.display(), text);
        }
        DocumentLookup::Missing { checked } => {
            println!("\n[No document found in {}]", checked.display());
        }
        DocumentLookup::NotDownloaded { checked } => match checked {
            Some(checked) => println!("\n[Document not downloaded: {}]", checked.display()),
            None => println!("\n[No document recorded for this artifact]"),
        },
    }

    Ok(())
}

async fn import_preview(settings: &Settings, logical_path: &str, image: PathBuf) -> Result<()> {
    let mut orchestrator = Orchestrator::open(settings).await?;
    find_artifact(&orchestrator, logical_path)?;

    let target = orchestrator
        .import_preview(logical_path, &image)
        .await
        .with_context(|| format!("Failed to import {}", image.display()))?;
    println!("Preview saved to {}", target.display());
    Ok(())
}

async fn save_notes(settings: &Settings, logical_path: &str, text: &str) -> Result<()> {
    let mut orchestrator = Orchestrator::open(settings).await?;
    find_artifact(&orchestrator, logical_path)?;

    orchestrator.save_notes(logical_path, text).await?;
    println!("Notes saved for {}", logical_path);
    Ok(())
}

async fn delete_artifact(settings: &Settings, logical_path: &str, yes: bool) -> Result<()> {
    let mut orchestrator = Orchestrator::open(settings).await?;
    let artifact = find_artifact(&orchestrator, logical_path)?;

    if !yes {
        eprint!(
            "Delete {} ({})? [y/N] ",
            artifact.absolute_path.display(),
            artifact.display_size()
        );
        io::stderr().flush()?;

        let mut answer = String::new();
        io::stdin()
            .read_line(&mut answer)
            .context("Failed to read confirmation")?;
        if !matches!(answer.trim(), "y" | "Y" | "yes") {
            println!("Aborted");
            return Ok(());
        }
    }

    orchestrator
        .delete_artifact(logical_path)
        .await
        .with_context(|| format!("Failed to delete {}", logical_path))?;
    println!("Deleted {}", logical_path);
    Ok(())
}

/// Execute config subcommands
async fn execute_config(settings: &Settings, command: ConfigCommands) -> Result<()> {
    let mut store = MetadataStore::load(&settings.config_path)?;

    match command {
        ConfigCommands::Show => {
            let document = store.document();
            println!("Settings file: {}", settings.config_path.display());
            println!("Hub endpoint:  {}", settings.hub_endpoint);
            println!(
                "Models folder: {}",
                document
                    .models_root()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!("App data:      {}", document.app_data_dir);
            println!(
                "Auth token:    {}",
                if document.auth_token.is_empty() { "(none)" } else { "(set)" }
            );
            println!("Records:       {}", document.records.len());

            println!("\nCategories:");
            for category in &document.categories {
                println!("  {:<16} {}", category.id, category.label);
            }
            println!("\nGroups: {}", document.base_groups.join(", "));
        }
        ConfigCommands::SetRoot { dir, app_data } => {
            let app_data = app_data.map(|p| p.to_string_lossy().into_owned());
            store.update_paths(&dir.to_string_lossy(), app_data.as_deref())?;
            println!("Models folder set to {}", dir.display());
        }
        ConfigCommands::SetToken { token } => {
            store.set_auth_token(&token)?;
            if token.trim().is_empty() {
                println!("Auth token cleared");
            } else {
                println!("Auth token saved");
            }
        }
    }

    Ok(())
}

fn find_artifact<'a>(orchestrator: &'a Orchestrator, logical_path: &str) -> Result<&'a Artifact> {
    orchestrator
        .artifact(logical_path)
        .with_context(|| format!("No artifact at '{}'. Run `modelshelf scan` to list them", logical_path))
}

/// Truncate a string to a maximum length, adding ellipsis if needed
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
