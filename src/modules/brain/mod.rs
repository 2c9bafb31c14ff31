pub mod llm;
pub mod translator;
pub mod summarizer;
pub mod selector;

pub use llm::OpenAiClient;
pub use selector::Selector;
pub use summarizer::Summarizer;
pub use translator::Translator;
