use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

use synapse_core::config::EngineConfig;
use synapse_core::error::{Result, SynapseError};
use synapse_core::extraction::ExtractionOptions;
use synapse_engine::KnowledgeEngine;

#[derive(Parser)]
#[command(name = "synapse", version, about = "Knowledge-graph extraction and reasoning")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract entities and relations into a graph
    Extract(InputArgs),
    /// Extract, then run the full graph analysis
    Analyze {
        #[command(flatten)]
        input: InputArgs,
        /// Identifier recorded on the analysis result
        #[arg(long, default_value = "cli")]
        graph_id: String,
    },
    /// Extract, then check the graph against its source text
    Validate(InputArgs),
    /// List the built-in domains
    Domains,
}

#[derive(Args)]
struct InputArgs {
    /// Input file; stdin when neither a file nor --text is given
    file: Option<PathBuf>,
    /// Inline input text
    #[arg(long, conflicts_with = "file")]
    text: Option<String>,
    /// Domain key, or several joined with '+'
    #[arg(long)]
    domain: Option<String>,
    /// Keep the default domain instead of detecting one
    #[arg(long)]
    no_auto_detect: bool,
}

impl InputArgs {
    async fn read(&self) -> Result<String> {
        if let Some(text) = &self.text {
            return Ok(text.clone());
        }
        if let Some(path) = &self.file {
            return Ok(tokio::fs::read_to_string(path).await?);
        }
        let mut buf = String::new();
        tokio::io::stdin().read_to_string(&mut buf).await?;
        Ok(buf)
    }

    fn options(&self, engine: &KnowledgeEngine) -> ExtractionOptions {
        let defaults = engine.default_options();
        ExtractionOptions {
            domain: self.domain.clone(),
            auto_detect: defaults.auto_detect && !self.no_auto_detect,
            document: self.file.as_ref().map(|p| p.display().to_string()),
        }
    }
}

fn print<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("synapse=info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = EngineConfig::from_env();
    let engine = KnowledgeEngine::from_config(&config).await;

    match cli.command {
        Command::Extract(input) => {
            let text = input.read().await?;
            let graph = engine.extract_entities_and_relations(&text, &input.options(&engine)).await;
            print(&serde_json::to_value(&graph)?)
        }
        Command::Analyze { input, graph_id } => {
            let text = input.read().await?;
            let graph = engine.extract_entities_and_relations(&text, &input.options(&engine)).await;
            if let Some(issue) = graph.metadata.error {
                return Err(SynapseError::InvalidInput(format!("input rejected: {:?}", issue)));
            }
            let analysis = engine.analyze_graph(&graph, &graph_id, &text).await;
            print(&json!({ "graph": graph, "analysis": analysis }))
        }
        Command::Validate(input) => {
            let text = input.read().await?;
            let graph = engine.extract_entities_and_relations(&text, &input.options(&engine)).await;
            let report = engine.validate_extraction(&graph, &text);
            print(&json!({
                "domain": graph.metadata.domain,
                "entity_count": graph.nodes.len(),
                "relation_count": graph.links.len(),
                "validation": report,
            }))
        }
        Command::Domains => print(&engine.domain_listing()),
    }
}
