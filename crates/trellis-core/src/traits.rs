use crate::error::Result;

/// Text completion boundary for language-model stages.
///
/// A stage that needs a model reply calls `complete` with a fully rendered
/// prompt and gets back the response text. The call is synchronous and
/// carries no retry contract; failures propagate to the caller unchanged.
pub trait TextCompleter: Send + Sync + 'static {
    fn complete(&self, prompt: &str) -> Result<String>;
}
