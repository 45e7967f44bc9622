//! Blocking chat-service client. Logs in once, then carries one conversation
//! (conversationId/parentMessageId) across `ask` calls, with a politeness
//! delay between requests and retries for transient failures.

use crate::config::Credentials;
use crate::generator::error::GeneratorError;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const DEFAULT_BASE_URL: &str = "https://chat.openai.com/api";
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; bookforge/0.1; +https://github.com/bookforge)";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_DELAY_SECS: u64 = 2;
const MAX_REDIRECTS: usize = 10;

/// Default number of attempts for transient failures (initial plus retries).
const DEFAULT_RETRY_COUNT: u32 = 3;
/// Default backoff delays in seconds after each failed attempt.
const DEFAULT_BACKOFF_SECS: [u64; 3] = [1, 2, 4];
/// Backoff for HTTP 429 (rate limit): wait longer so the service can recover.
const BACKOFF_429_SECS: [u64; 4] = [30, 60, 90, 120];

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
    provider: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(alias = "accessToken")]
    access_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AskRequest<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    conversation_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_message_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AskResponse {
    message: String,
    conversation_id: Option<String>,
    message_id: Option<String>,
}

/// Blocking chat client holding login and conversation state.
#[derive(Debug)]
pub struct ChatClient {
    inner: reqwest::blocking::Client,
    base_url: String,
    access_token: Option<String>,
    conversation_id: Option<String>,
    parent_message_id: Option<String>,
    delay: Duration,
    last_request: Option<Instant>,
    retry_count: u32,
    backoff_secs: Vec<u64>,
}

impl ChatClient {
    /// Build a client with default base URL, User-Agent, timeout, and delay.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::builder().build()
    }

    /// Builder for custom base URL, User-Agent, delay, timeout, and retries.
    pub fn builder() -> ChatClientBuilder {
        ChatClientBuilder::default()
    }

    /// Log in with the given credentials and store the access token.
    /// `isMicrosoftLogin` selects the Microsoft provider over plain email login.
    pub fn login(&mut self, credentials: &Credentials) -> Result<(), GeneratorError> {
        let url = format!("{}/auth/login", self.base_url);
        let provider = if credentials.is_microsoft_login {
            "microsoft"
        } else {
            "email"
        };
        let request = LoginRequest {
            email: &credentials.email,
            password: &credentials.password,
            provider,
        };
        let response = self
            .post_with_retry(&url, &request, None)
            .map_err(|e| GeneratorError::Network {
                url: url.clone(),
                source: e,
            })?;
        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(GeneratorError::AuthFailed {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(GeneratorError::HttpStatus {
                status: status.as_u16(),
                url,
            });
        }
        let body: LoginResponse = response
            .json()
            .map_err(|e| GeneratorError::MalformedResponse {
                url,
                reason: e.to_string(),
            })?;
        self.access_token = Some(body.access_token);
        Ok(())
    }

    /// Send one message in the ongoing conversation and return the reply text.
    /// Conversation state is threaded through so later prompts see earlier ones.
    pub fn ask(&mut self, prompt: &str) -> Result<String, GeneratorError> {
        let url = format!("{}/conversation", self.base_url);
        // Clone the ids out of self so the request does not hold a borrow
        // across the mutable retry call.
        let conversation_id = self.conversation_id.clone();
        let parent_message_id = self.parent_message_id.clone();
        let request = AskRequest {
            message: prompt,
            conversation_id: conversation_id.as_deref(),
            parent_message_id: parent_message_id.as_deref(),
        };
        let token = self.access_token.clone();
        let response = self
            .post_with_retry(&url, &request, token.as_deref())
            .map_err(|e| GeneratorError::Network {
                url: url.clone(),
                source: e,
            })?;
        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(GeneratorError::AuthFailed {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(GeneratorError::HttpStatus {
                status: status.as_u16(),
                url,
            });
        }
        let body: AskResponse = response
            .json()
            .map_err(|e| GeneratorError::MalformedResponse {
                url,
                reason: e.to_string(),
            })?;
        if let Some(id) = body.conversation_id {
            self.conversation_id = Some(id);
        }
        if let Some(id) = body.message_id {
            self.parent_message_id = Some(id);
        }
        Ok(body.message)
    }

    /// POST JSON with retries for transient failures.
    ///
    /// Retries on: timeout, connection errors, HTTP 5xx, and HTTP 429 (longer
    /// backoff). Other statuses are returned to the caller for mapping. On
    /// success or after exhausting retries, updates the last-request time.
    fn post_with_retry<B: Serialize>(
        &mut self,
        url: &str,
        body: &B,
        bearer: Option<&str>,
    ) -> Result<reqwest::blocking::Response, reqwest::Error> {
        let max_attempts = self.retry_count;
        let mut last_err: Option<reqwest::Error> = None;
        for attempt in 0..max_attempts {
            self.wait_delay();
            let mut builder = self.inner.post(url).json(body);
            if let Some(token) = bearer {
                builder = builder.bearer_auth(token);
            }
            match builder.send() {
                Ok(response) => {
                    let status = response.status();
                    let retryable_status = status.is_server_error() || status.as_u16() == 429;
                    if retryable_status && attempt < max_attempts - 1 {
                        last_err = Some(response.error_for_status().unwrap_err());
                        let backoff = if status.as_u16() == 429 {
                            BACKOFF_429_SECS
                                .get(attempt as usize)
                                .copied()
                                .unwrap_or(*BACKOFF_429_SECS.last().unwrap_or(&60))
                        } else {
                            self.backoff_secs
                                .get(attempt as usize)
                                .copied()
                                .unwrap_or_else(|| *self.backoff_secs.last().unwrap_or(&1))
                        };
                        std::thread::sleep(Duration::from_secs(backoff));
                        continue;
                    }
                    self.last_request = Some(Instant::now());
                    return Ok(response);
                }
                Err(e) => {
                    let retryable = e.is_timeout() || e.is_connect();
                    if retryable && attempt < max_attempts - 1 {
                        last_err = Some(e);
                        let backoff = self
                            .backoff_secs
                            .get(attempt as usize)
                            .copied()
                            .unwrap_or_else(|| *self.backoff_secs.last().unwrap_or(&1));
                        std::thread::sleep(Duration::from_secs(backoff));
                        continue;
                    }
                    return Err(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| self.inner.get("http://[::1]:0/").send().unwrap_err()))
    }

    fn wait_delay(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                std::thread::sleep(self.delay - elapsed);
            }
        }
    }
}

/// Builder for ChatClient with optional base URL, User-Agent, delay, timeout,
/// and retry settings.
#[derive(Debug)]
pub struct ChatClientBuilder {
    base_url: Option<String>,
    user_agent: Option<String>,
    delay_secs: u64,
    timeout_secs: u64,
    retry_count: u32,
    retry_backoff_secs: Vec<u64>,
}

impl Default for ChatClientBuilder {
    fn default() -> Self {
        Self {
            base_url: None,
            user_agent: None,
            delay_secs: DEFAULT_DELAY_SECS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retry_count: DEFAULT_RETRY_COUNT,
            retry_backoff_secs: DEFAULT_BACKOFF_SECS.to_vec(),
        }
    }
}

impl ChatClientBuilder {
    /// Set the chat service base URL. Trailing slashes are stripped.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set a custom User-Agent.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Set delay between requests in seconds. Default 2.
    pub fn delay_secs(mut self, secs: u64) -> Self {
        self.delay_secs = secs;
        self
    }

    /// Set request timeout in seconds. Default 120 (chapter generation is slow).
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set number of HTTP attempts for transient failures (default 3).
    pub fn retry_count(mut self, n: u32) -> Self {
        self.retry_count = n.max(1);
        self
    }

    /// Set backoff delays in seconds before each retry (e.g. [1, 2, 4]).
    /// If shorter than retry_count - 1, the last value is reused.
    pub fn retry_backoff_secs(mut self, secs: Vec<u64>) -> Self {
        self.retry_backoff_secs = secs;
        self
    }

    /// Build the blocking client and chat wrapper.
    pub fn build(self) -> Result<ChatClient, reqwest::Error> {
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let inner = reqwest::blocking::Client::builder()
            .cookie_store(true)
            .user_agent(user_agent)
            .timeout(Duration::from_secs(self.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        let backoff_secs = if self.retry_backoff_secs.is_empty() {
            let n = self.retry_count.saturating_sub(1) as usize;
            (0..n).map(|i| 1u64 << i.min(4)).collect::<Vec<_>>()
        } else {
            self.retry_backoff_secs
        };
        Ok(ChatClient {
            inner,
            base_url,
            access_token: None,
            conversation_id: None,
            parent_message_id: None,
            delay: Duration::from_secs(self.delay_secs),
            last_request: None,
            retry_count: self.retry_count,
            backoff_secs,
        })
    }
}
