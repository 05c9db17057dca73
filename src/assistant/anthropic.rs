use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    config::AnthropicConfig, db::Database, error::AssistantError, types::ChequeTransaction,
};

use super::{
    AiAssistant, ANALYSIS_SYSTEM_PROMPT, IMAGE_EXTRACTION_PROMPT, IMAGE_INSTRUCTION, NO_ANALYSIS,
    NO_REPLY, NO_REPORT, PLACEHOLDER_IMAGE, PLACEHOLDER_TRANSPORT, PLACEHOLDER_UNPARSED,
    QUERY_SYSTEM_PROMPT, REPORT_PREAMBLE, TEXT_EXTRACTION_PROMPT, UNSUPPORTED_REPORT,
    build_analysis_prompt, build_report_prompt, load_report_data, parse_transaction_reply,
    placeholder_transaction,
};

/// Assistant backed by an Anthropic-style messages endpoint: API key and
/// version travel as headers, message content is either a string or a list
/// of typed blocks, and error details ride inside the response body.
pub struct AnthropicAssistant {
    client: Client,
    db: Arc<dyn Database>,
    state: RwLock<State>,
}

#[derive(Debug)]
struct State {
    config: AnthropicConfig,
    ready: bool,
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentBlock {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Debug, Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'static str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ReplyBlock>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ReplyBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

fn system(prompt: impl Into<String>) -> Message {
    Message {
        role: "system",
        content: MessageContent::Text(prompt.into()),
    }
}

fn user_text(text: impl Into<String>) -> Message {
    Message {
        role: "user",
        content: MessageContent::Blocks(vec![ContentBlock::Text { text: text.into() }]),
    }
}

fn first_text(response: MessagesResponse) -> Option<String> {
    response.content.into_iter().next().map(|block| block.text)
}

/// First reply text, the vendor's error message, or the given fallback.
fn reply_text(response: MessagesResponse, fallback: &str) -> String {
    if let Some(block) = response.content.into_iter().next() {
        block.text
    } else if let Some(error) = response.error {
        format!("Error: {}", error.message)
    } else {
        fallback.to_owned()
    }
}

impl AnthropicAssistant {
    pub fn new(config: AnthropicConfig, db: Arc<dyn Database>) -> Self {
        Self {
            client: Client::new(),
            db,
            state: RwLock::new(State {
                config,
                ready: false,
            }),
        }
    }

    fn config_if_ready(&self) -> Result<AnthropicConfig, AssistantError> {
        let state = self
            .state
            .read()
            .map_err(|_| AssistantError::Uninitialized)?;
        if state.ready {
            Ok(state.config.clone())
        } else {
            Err(AssistantError::Uninitialized)
        }
    }

    async fn send(
        &self,
        config: &AnthropicConfig,
        messages: Vec<Message>,
        max_tokens: u32,
        temperature: f32,
    ) -> anyhow::Result<MessagesResponse> {
        let payload = MessagesRequest {
            model: config.model.clone(),
            messages,
            max_tokens,
            temperature,
        };

        let response = self
            .client
            .post(&config.endpoint)
            .header("x-api-key", &config.api_key)
            .header("anthropic-version", &config.api_version)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?
            .json::<MessagesResponse>()
            .await?;

        Ok(response)
    }
}

#[async_trait]
impl AiAssistant for AnthropicAssistant {
    async fn initialize(&self, api_key: &str, model: &str) -> bool {
        let config = {
            let Ok(mut state) = self.state.write() else {
                return false;
            };
            state.config.api_key = api_key.to_owned();
            state.config.model = model.to_owned();
            state.ready = false;
            state.config.clone()
        };

        let probe = vec![user_text("Hello, are you connected?")];
        match self.send(&config, probe, 50, config.temperature).await {
            Ok(_) => {
                if let Ok(mut state) = self.state.write() {
                    state.ready = true;
                }
                info!(model = %config.model, "Anthropic assistant initialized");
                true
            }
            Err(error) => {
                warn!(%error, "failed to initialize Anthropic assistant");
                false
            }
        }
    }

    async fn process_query(&self, user_query: &str) -> Result<String, AssistantError> {
        let config = self.config_if_ready()?;
        let messages = vec![system(QUERY_SYSTEM_PROMPT), user_text(user_query)];

        match self
            .send(&config, messages, config.max_tokens, config.temperature)
            .await
        {
            Ok(response) => Ok(reply_text(response, NO_REPLY)),
            Err(error) => Ok(format!("Error processing your query: {error}")),
        }
    }

    async fn create_transaction_from_text(
        &self,
        description: &str,
    ) -> Result<ChequeTransaction, AssistantError> {
        let config = self.config_if_ready()?;
        let messages = vec![system(TEXT_EXTRACTION_PROMPT), user_text(description)];

        // Lower temperature keeps field extraction deterministic.
        match self.send(&config, messages, config.max_tokens, 0.3).await {
            Ok(response) => match first_text(response).as_deref().map(parse_transaction_reply) {
                Some(Some(transaction)) => Ok(transaction),
                _ => {
                    warn!("text extraction reply was not valid transaction JSON");
                    Ok(placeholder_transaction(PLACEHOLDER_UNPARSED))
                }
            },
            Err(error) => {
                warn!(%error, "text extraction request failed");
                Ok(placeholder_transaction(PLACEHOLDER_TRANSPORT))
            }
        }
    }

    async fn extract_data_from_image(
        &self,
        image: &[u8],
    ) -> Result<ChequeTransaction, AssistantError> {
        let config = self.config_if_ready()?;

        let content = MessageContent::Blocks(vec![
            ContentBlock::Text {
                text: IMAGE_INSTRUCTION.to_owned(),
            },
            ContentBlock::Image {
                source: ImageSource {
                    kind: "base64",
                    media_type: "image/jpeg",
                    data: STANDARD.encode(image),
                },
            },
        ]);
        let messages = vec![
            system(IMAGE_EXTRACTION_PROMPT),
            Message {
                role: "user",
                content,
            },
        ];

        match self.send(&config, messages, config.max_tokens, 0.3).await {
            Ok(response) => match first_text(response).as_deref().map(parse_transaction_reply) {
                Some(Some(transaction)) => Ok(transaction),
                _ => {
                    warn!("image extraction reply was not valid transaction JSON");
                    Ok(placeholder_transaction(PLACEHOLDER_IMAGE))
                }
            },
            Err(error) => {
                warn!(%error, "image extraction request failed");
                Ok(placeholder_transaction(PLACEHOLDER_TRANSPORT))
            }
        }
    }

    async fn analyze_transactions(&self, query: &str) -> Result<String, AssistantError> {
        let config = self.config_if_ready()?;
        let transactions = self.db.get_transactions().await;
        let messages = vec![
            system(ANALYSIS_SYSTEM_PROMPT),
            user_text(build_analysis_prompt(&transactions, query)),
        ];

        match self.send(&config, messages, config.max_tokens, 0.5).await {
            Ok(response) => Ok(reply_text(response, NO_ANALYSIS)),
            Err(error) => Ok(format!("Error analyzing transactions: {error}")),
        }
    }

    async fn generate_report(
        &self,
        report_type: &str,
        parameters: &str,
    ) -> Result<String, AssistantError> {
        let config = self.config_if_ready()?;
        let Some((branch_prompt, data)) = load_report_data(self.db.as_ref(), report_type).await
        else {
            return Ok(UNSUPPORTED_REPORT.to_owned());
        };

        let messages = vec![
            system(format!("{REPORT_PREAMBLE} {branch_prompt}")),
            user_text(build_report_prompt(&data, parameters)),
        ];

        match self.send(&config, messages, config.max_tokens, 0.3).await {
            Ok(response) => Ok(reply_text(response, NO_REPORT)),
            Err(error) => Ok(format!("Error generating report: {error}")),
        }
    }
}
