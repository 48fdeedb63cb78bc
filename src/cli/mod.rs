pub mod doctor;
pub mod recent;
pub mod search;
pub mod stats;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::config::{expand_tilde, TabRecallConfig};

/// One model to fetch: where it goes and which files make it up.
struct ModelSpec {
    label: &'static str,
    dir: PathBuf,
    /// `(file name, url, size hint)`
    files: &'static [(&'static str, &'static str, &'static str)],
}

const EMBEDDING_FILES: &[(&str, &str, &str)] = &[
    (
        "model.onnx",
        "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main/onnx/model.onnx",
        "~90MB",
    ),
    (
        "tokenizer.json",
        "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main/tokenizer.json",
        "~0.5MB",
    ),
];

const RERANKER_FILES: &[(&str, &str, &str)] = &[
    (
        "model.onnx",
        "https://huggingface.co/cross-encoder/ms-marco-MiniLM-L-6-v2/resolve/main/onnx/model.onnx",
        "~90MB",
    ),
    (
        "tokenizer.json",
        "https://huggingface.co/cross-encoder/ms-marco-MiniLM-L-6-v2/resolve/main/tokenizer.json",
        "~0.7MB",
    ),
];

/// Download the embedding model and, when reranking is enabled, the cross-encoder.
pub async fn model_download(config: &TabRecallConfig) -> Result<()> {
    let mut specs = vec![ModelSpec {
        label: "embedding model",
        dir: expand_tilde(&config.embedding.cache_dir),
        files: EMBEDDING_FILES,
    }];
    if config.retrieval.use_reranking {
        specs.push(ModelSpec {
            label: "reranker",
            dir: expand_tilde(&config.retrieval.reranker_dir),
            files: RERANKER_FILES,
        });
    } else {
        println!("Reranking disabled, skipping the cross-encoder.");
    }

    for spec in &specs {
        fetch_model(spec).await?;
    }

    println!("Model download complete. Ready for use.");
    Ok(())
}

async fn fetch_model(spec: &ModelSpec) -> Result<()> {
    std::fs::create_dir_all(&spec.dir)
        .with_context(|| format!("failed to create model dir: {}", spec.dir.display()))?;

    for (name, url, size) in spec.files {
        let dest = spec.dir.join(name);
        if dest.exists() {
            println!("{} {name} already at {}", spec.label, dest.display());
            continue;
        }
        println!("Downloading {} {name} ({size})...", spec.label);
        download_file(url, &dest).await?;
        println!("Saved to {}", dest.display());
    }
    Ok(())
}

/// Stream `url` to `dest` with a progress bar. Writes to a `.tmp` sibling, then renames.
async fn download_file(url: &str, dest: &Path) -> Result<()> {
    let mut response = reqwest::get(url)
        .await
        .with_context(|| format!("HTTP request failed for {url}"))?;

    anyhow::ensure!(
        response.status().is_success(),
        "download failed with HTTP {}",
        response.status()
    );

    let pb = match response.content_length() {
        Some(size) => {
            let pb = ProgressBar::new(size);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("  {bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})")?
                    .progress_chars("##-"),
            );
            pb
        }
        None => ProgressBar::new_spinner(),
    };

    let tmp_path = dest.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp_path)
        .await
        .with_context(|| format!("failed to create temp file: {}", tmp_path.display()))?;

    while let Some(chunk) = response.chunk().await.context("error reading response")? {
        file.write_all(&chunk)
            .await
            .context("error writing to file")?;
        pb.inc(chunk.len() as u64);
    }

    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp_path, dest)
        .await
        .context("failed to rename temp file")?;

    pb.finish_and_clear();
    Ok(())
}

/// First `max` characters of `text` on one line, for terminal listings.
pub(crate) fn one_line(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    crate::memory::page::truncate_chars(&flat, max)
}
