use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use silex_sparql::rdf::{NamespaceManager, RdfFormat};
use silex_sparql::{MapperConfig, MemoryGraphStore, NamedNode, ResourceTree, SparqlService};
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: silex-sparql [config.yaml] <ontology.ttl|ontology.nt>";

fn main() -> anyhow::Result<()> {
    let mut args: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();
    let ontology = args.pop().context(USAGE)?;
    let config = match args.pop() {
        Some(path) => MapperConfig::from_file(&path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => MapperConfig::default(),
    };

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&config.log_filter))
                .context("invalid log filter")?,
        )
        .init();

    println!("silex-sparql v{}", silex_sparql::version());
    println!("==========================================");

    let format = ontology
        .extension()
        .and_then(|e| e.to_str())
        .and_then(RdfFormat::from_extension)
        .unwrap_or(RdfFormat::Turtle);
    let text = std::fs::read_to_string(&ontology)
        .with_context(|| format!("reading {}", ontology.display()))?;

    let namespaces = config.namespaces();
    let service = SparqlService::new(Arc::new(MemoryGraphStore::new()), config);
    let loaded = service.load_ontology(None, &text, format)?;
    info!("Loaded {} quads from {}", loaded, ontology.display());

    let tree = service.class_tree(None, None)?;
    println!(
        "{} classes under {} roots",
        tree.len(),
        tree.list_roots().len()
    );
    print_tree(&tree, &namespaces);
    Ok(())
}

fn print_tree(tree: &ResourceTree<NamedNode>, namespaces: &NamespaceManager) {
    tree.traverse(|node, depth| {
        let name = namespaces
            .compact(node.uri.as_str())
            .unwrap_or_else(|| node.uri.as_str().to_string());
        println!("{}{}", "  ".repeat(depth), name);
    });
}
