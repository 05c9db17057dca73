use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    config::OpenAiConfig, db::Database, error::AssistantError, types::ChequeTransaction,
};

use super::{
    AiAssistant, ANALYSIS_SYSTEM_PROMPT, IMAGE_EXTRACTION_PROMPT, IMAGE_INSTRUCTION, NO_ANALYSIS,
    NO_REPLY, NO_REPORT, PLACEHOLDER_IMAGE, PLACEHOLDER_TRANSPORT, PLACEHOLDER_UNPARSED,
    QUERY_SYSTEM_PROMPT, REPORT_PREAMBLE, TEXT_EXTRACTION_PROMPT, UNSUPPORTED_REPORT,
    build_analysis_prompt, build_report_prompt, load_report_data, parse_transaction_reply,
    placeholder_transaction,
};

/// Assistant backed by an OpenAI-style chat-completions endpoint: bearer
/// auth, text/image_url content parts with a data-URI for images, a JSON
/// response-format hint for structured extraction, and a separate model
/// identifier for the vision-capable variant.
pub struct OpenAiAssistant {
    client: Client,
    db: Arc<dyn Database>,
    state: RwLock<State>,
}

#[derive(Debug)]
struct State {
    config: OpenAiConfig,
    ready: bool,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: String,
}

fn system(prompt: impl Into<String>) -> ChatMessage {
    ChatMessage {
        role: "system",
        content: MessageContent::Text(prompt.into()),
    }
}

fn user_text(text: impl Into<String>) -> ChatMessage {
    ChatMessage {
        role: "user",
        content: MessageContent::Text(text.into()),
    }
}

fn first_text(response: ChatCompletionResponse) -> Option<String> {
    // An empty content string counts as no reply, like a missing choice.
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .filter(|text| !text.is_empty())
}

impl OpenAiAssistant {
    pub fn new(config: OpenAiConfig, db: Arc<dyn Database>) -> Self {
        Self {
            client: Client::new(),
            db,
            state: RwLock::new(State {
                config,
                ready: false,
            }),
        }
    }

    fn config_if_ready(&self) -> Result<OpenAiConfig, AssistantError> {
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
        config: &OpenAiConfig,
        model: &str,
        messages: Vec<ChatMessage>,
        temperature: f32,
        json_reply: bool,
    ) -> anyhow::Result<ChatCompletionResponse> {
        let payload = ChatCompletionRequest {
            model: model.to_owned(),
            messages,
            max_tokens: config.max_tokens,
            temperature,
            response_format: json_reply.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let response = self
            .client
            .post(&config.endpoint)
            .bearer_auth(&config.api_key)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?
            .json::<ChatCompletionResponse>()
            .await?;

        Ok(response)
    }
}

#[async_trait]
impl AiAssistant for OpenAiAssistant {
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

        let probe = vec![
            system("You are a helpful assistant."),
            user_text("Hello, are you connected?"),
        ];
        match self.send(&config, &config.model, probe, 0.7, false).await {
            Ok(response) if !response.choices.is_empty() => {
                if let Ok(mut state) = self.state.write() {
                    state.ready = true;
                }
                info!(model = %config.model, "OpenAI assistant initialized");
                true
            }
            Ok(_) => {
                warn!("OpenAI probe returned no choices");
                false
            }
            Err(error) => {
                warn!(%error, "failed to initialize OpenAI assistant");
                false
            }
        }
    }

    async fn process_query(&self, user_query: &str) -> Result<String, AssistantError> {
        let config = self.config_if_ready()?;
        let messages = vec![system(QUERY_SYSTEM_PROMPT), user_text(user_query)];

        match self
            .send(&config, &config.model, messages, config.temperature, false)
            .await
        {
            Ok(response) => Ok(first_text(response).unwrap_or_else(|| NO_REPLY.to_owned())),
            Err(error) => Ok(format!("Error processing your query: {error}")),
        }
    }

    async fn create_transaction_from_text(
        &self,
        description: &str,
    ) -> Result<ChequeTransaction, AssistantError> {
        let config = self.config_if_ready()?;
        let messages = vec![system(TEXT_EXTRACTION_PROMPT), user_text(description)];

        // Lower temperature plus the json_object hint for deterministic fields.
        match self
            .send(&config, &config.model, messages, 0.3, true)
            .await
        {
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

        let data_uri = format!("data:image/jpeg;base64,{}", STANDARD.encode(image));
        let messages = vec![
            system(IMAGE_EXTRACTION_PROMPT),
            ChatMessage {
                role: "user",
                content: MessageContent::Parts(vec![
                    ContentPart::Text {
                        text: IMAGE_INSTRUCTION.to_owned(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: data_uri },
                    },
                ]),
            },
        ];

        match self
            .send(&config, &config.vision_model, messages, 0.3, true)
            .await
        {
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

        match self
            .send(&config, &config.model, messages, 0.5, false)
            .await
        {
            Ok(response) => Ok(first_text(response).unwrap_or_else(|| NO_ANALYSIS.to_owned())),
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

        match self
            .send(&config, &config.model, messages, 0.3, false)
            .await
        {
            Ok(response) => Ok(first_text(response).unwrap_or_else(|| NO_REPORT.to_owned())),
            Err(error) => Ok(format!("Error generating report: {error}")),
        }
    }
}
