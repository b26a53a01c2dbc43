//! Retrieval with the real fastembed model.
//!
//! These download the AllMiniLML6V2 model on first run, so they are ignored
//! by default. Run with: cargo test --test embedding_model_test -- --ignored

use tempfile::TempDir;
use termchat::retrieval::{
    DocumentChunker, EmbeddingProvider, FastEmbedProvider, RetrievalService,
};

#[test]
#[ignore = "downloads the embedding model (~86MB) - run with --ignored"]
fn real_model_ranks_related_text_higher() {
    let dir = TempDir::new().unwrap();
    let provider = FastEmbedProvider::new("AllMiniLML6V2", dir.path().join("models")).unwrap();
    assert_eq!(provider.dimension(), 384);

    let vectors = provider
        .embed(&[
            "parse JSON data from a string",
            "serialize a data structure to JSON",
            "calculate the factorial of a number",
        ])
        .unwrap();

    let query = provider.embed(&["decode JSON input"]).unwrap();

    let distance = |a: &[f32], b: &[f32]| -> f32 {
        a.iter()
            .zip(b)
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
    };

    let to_parse = distance(&query[0], &vectors[0]);
    let to_factorial = distance(&query[0], &vectors[2]);
    assert!(
        to_parse < to_factorial,
        "JSON query should sit closer to the JSON chunk ({to_parse} vs {to_factorial})"
    );
}

#[tokio::test]
#[ignore = "downloads the embedding model (~86MB) - run with --ignored"]
async fn real_model_end_to_end_ingest_and_query() {
    let dir = TempDir::new().unwrap();
    let provider =
        FastEmbedProvider::new("AllMiniLML6V2", dir.path().join("models")).unwrap();

    let doc_path = dir.path().join("notes.txt");
    std::fs::write(
        &doc_path,
        "The vector index answers nearest-neighbor queries by exact L2 distance.\n\n\
         The chat client streams responses from the configured provider.",
    )
    .unwrap();

    let mut service = RetrievalService::new(
        DocumentChunker::with_defaults().unwrap(),
        Box::new(provider),
        384,
        dir.path().join("vectorstore"),
    );

    let chunks = service.ingest(&doc_path).await.unwrap();
    assert!(!chunks.is_empty());

    let results = service
        .query("how are nearest neighbors found?", 3)
        .await
        .unwrap();
    assert!(!results.is_empty());
    assert!(results[0].score > 0.0 && results[0].score <= 1.0);
    assert!(results[0].content.contains("nearest-neighbor"));
}
