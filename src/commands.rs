use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::info;

use trellis_core::config::AppConfig;
use trellis_ingest::{ingest_dir, EmbeddingProvider, HttpEmbeddingProvider, TextSplitter, VectorStore};
use trellis_llm::OpenAiClient;
use trellis_ocr::{write_markdown, OcrClient};

use crate::chat;
use crate::triage::{self, Email};

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    AppConfig::load(path).with_context(|| format!("loading config from {}", path.display()))
}

/// Run the triage graph over one email and print the outcome.
pub fn triage(config: &AppConfig, email: Email) -> anyhow::Result<()> {
    let completer = Arc::new(OpenAiClient::new(config.model.clone()));
    let plan = triage::build_triage_graph(completer)?;

    let final_state = plan.run(triage::initial_state(&email))?;

    match final_state.get_bool("is_spam") {
        Some(true) => println!("Verdict: spam"),
        Some(false) => println!("Verdict: legitimate"),
        None => println!("Verdict: unknown"),
    }
    if let Some(messages) = final_state.get("messages").and_then(|m| m.as_array()) {
        info!(messages = messages.len(), "triage run finished");
    }
    Ok(())
}

/// Send one prompt through the chat graph and print the reply.
pub fn chat(config: &AppConfig, prompt: &str) -> anyhow::Result<()> {
    let completer = Arc::new(OpenAiClient::new(config.model.clone()));
    let plan = chat::build_chat_graph(completer)?;

    let final_state = plan.run(chat::initial_state(prompt))?;
    match chat::last_reply(&final_state) {
        Some(reply) => println!("{reply}"),
        None => bail!("model returned no reply"),
    }
    Ok(())
}

/// Convert a PDF to markdown with page markers, extracting embedded images.
pub fn convert(config: &AppConfig, pdf: &Path, out_dir: &Path) -> anyhow::Result<()> {
    let stem = pdf
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());

    let client = OcrClient::new(config.ocr.clone());
    let response = client.process(pdf)?;

    let md_path = out_dir.join(format!("{stem}.md"));
    let images_dir = out_dir.join(format!("images-{stem}"));
    write_markdown(&response, &md_path, &images_dir)?;

    println!(
        "Converted {} pages -> {}",
        response.pages.len(),
        md_path.display()
    );
    Ok(())
}

/// Ingest a directory of markdown files into the vector store.
pub fn ingest(config: &AppConfig, dir: &Path, db: Option<PathBuf>) -> anyhow::Result<()> {
    let db_path = db.unwrap_or_else(|| PathBuf::from(&config.store.db_path));
    let store = VectorStore::open(&db_path)?;
    let provider = HttpEmbeddingProvider::new(&config.embedding);
    let splitter = TextSplitter::default();

    let report = ingest_dir(dir, &splitter, &provider, &store)?;
    println!(
        "Ingested {} chunks from {} files into {}",
        report.chunks,
        report.files,
        db_path.display()
    );
    Ok(())
}

/// Embed a query and print the most similar stored chunks.
pub fn search(
    config: &AppConfig,
    query: &str,
    db: Option<PathBuf>,
    limit: usize,
) -> anyhow::Result<()> {
    let db_path = db.unwrap_or_else(|| PathBuf::from(&config.store.db_path));
    let store = VectorStore::open(&db_path)?;
    let provider = HttpEmbeddingProvider::new(&config.embedding);

    let vectors = provider.embed(&[query.to_string()])?;
    let query_vec = match vectors.into_iter().next() {
        Some(v) => v,
        None => bail!("embedding provider returned no vector"),
    };

    let results = store.search(&query_vec, limit)?;
    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (rank, hit) in results.iter().enumerate() {
        println!(
            "{}. [{:.3}] {} (page {})",
            rank + 1,
            hit.similarity,
            hit.source,
            hit.page
        );
        println!("   {}", preview(&hit.content, 160));
    }
    Ok(())
}

/// Print the resolved configuration.
pub fn show_config(config: &AppConfig) -> anyhow::Result<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{cut}…")
    }
}
