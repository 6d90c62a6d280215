/// Local embedding generation
///
/// One seam, two implementations: the FastEmbed-backed provider for real
/// use (multilingual E5 over ONNX, offline after the first download) and
/// whatever deterministic stand-in the tests inject. The vector store only
/// sees the trait.
mod provider;

pub use provider::{EmbeddingError, EmbeddingProvider, FastEmbedProvider};
