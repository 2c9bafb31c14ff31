use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::llm::{strip_code_fences, ChatRequest, LanguageModel, TokenUsage};
use crate::config::pipeline_config::AiConfig;

const TRANSLATE_PROMPT: &str = r#"You are a professional translator. Translate the following news titles and descriptions from English to Korean.
Return ONLY a JSON array in the same order:
[{"title": "한국어 제목", "description": "한국어 설명"}]
Keep company names, stock tickers, and proper nouns as-is. Translate naturally for Korean readers."#;

#[derive(Debug, Clone, PartialEq)]
pub struct NewsText {
    pub title: String,
    pub description: Option<String>,
}

#[derive(Serialize)]
struct IndexedText<'a> {
    id: usize,
    title: &'a str,
    description: &'a str,
}

#[derive(Deserialize)]
struct TranslatedText {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranslationOutcome {
    /// None = 整批不翻译，调用方必须全部用原文
    pub texts: Option<Vec<NewsText>>,
    pub usage: TokenUsage,
}

pub struct Translator {
    llm: Arc<dyn LanguageModel>,
    model: String,
    max_tokens: u32,
    temperature: f64,
}

impl Translator {
    pub fn new(llm: Arc<dyn LanguageModel>, ai: &AiConfig) -> Self {
        Self {
            llm,
            model: ai.translate_model.clone(),
            max_tokens: ai.max_tokens_translate,
            temperature: ai.translate_temperature,
        }
    }

    /// 整批翻译。任何失败 (请求、解析、长度不一致) 都返回 texts = None。
    pub async fn translate(&self, items: &[NewsText]) -> TranslationOutcome {
        if items.is_empty() {
            return TranslationOutcome { texts: Some(vec![]), usage: TokenUsage::default() };
        }

        let indexed: Vec<IndexedText> = items
            .iter()
            .enumerate()
            .map(|(id, item)| IndexedText {
                id,
                title: &item.title,
                description: item.description.as_deref().unwrap_or(""),
            })
            .collect();

        let user = match serde_json::to_string(&indexed) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to serialize translation batch: {}", e);
                return self.untranslated(TokenUsage::default());
            }
        };

        let request = ChatRequest {
            model: self.model.clone(),
            system: TRANSLATE_PROMPT.to_string(),
            user,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let completion = match self.llm.complete(request).await {
            Ok(c) => c,
            Err(e) => {
                warn!("🌐 Translation request failed, keeping source text: {}", e);
                return self.untranslated(TokenUsage::default());
            }
        };

        match apply_translation(items, &completion.content) {
            Some(texts) => TranslationOutcome { texts: Some(texts), usage: completion.usage },
            None => {
                warn!("🌐 Translation output rejected (malformed or size mismatch), keeping source text");
                self.untranslated(completion.usage)
            }
        }
    }

    fn untranslated(&self, usage: TokenUsage) -> TranslationOutcome {
        TranslationOutcome { texts: None, usage }
    }
}

/// 严格解析：必须是长度与输入一致的数组。单条缺字段时用同一条的原文补。
fn apply_translation(items: &[NewsText], raw: &str) -> Option<Vec<NewsText>> {
    let parsed: Vec<TranslatedText> = serde_json::from_str(&strip_code_fences(raw)).ok()?;
    if parsed.len() != items.len() {
        return None;
    }

    let texts = parsed
        .into_iter()
        .zip(items)
        .map(|(t, source)| NewsText {
            title: t.title.filter(|s| !s.trim().is_empty()).unwrap_or_else(|| source.title.clone()),
            description: t
                .description
                .filter(|s| !s.trim().is_empty())
                .or_else(|| source.description.clone()),
        })
        .collect();

    Some(texts)
}
