use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::{Client as HttpClient, RequestBuilder, Response};
use scraper::{ElementRef, Html, Selector};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use crate::api::ChatBackend;
use crate::api::models::{
    ContactEntry, ConversationData, ConversationId, Envelope, Export, MessageId, SentData,
};
use crate::contacts::NO_MESSAGES;
use crate::error::{ClientError, Result};
use crate::feedback::Rating;
use crate::profile::ProfileDraft;

const CSRF_HEADER: &str = "X-CSRFToken";
const SIGNUP_REJECTIONS: [&str; 2] = ["Email already registered", "Passwords must match"];

static CONTACT_SEL: Lazy<Selector> = Lazy::new(|| selector("li.contact"));
static NAME_SEL: Lazy<Selector> = Lazy::new(|| selector(".name"));
static DESCRIPTION_SEL: Lazy<Selector> = Lazy::new(|| selector(".description"));
static PREVIEW_SEL: Lazy<Selector> = Lazy::new(|| selector(".preview"));
static TIME_SEL: Lazy<Selector> = Lazy::new(|| selector(".time"));
static FULLNAME_SEL: Lazy<Selector> = Lazy::new(|| selector("#user-fullname"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

/// What the dashboard page tells us about the logged-in user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dashboard {
    pub fullname: Option<String>,
    pub contacts: Vec<ContactEntry>,
}

pub struct ApiClient {
    pub http: HttpClient,
    base: Url,
    csrf_token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_options(base_url, None, None)
    }

    pub fn with_options(
        base_url: &str,
        csrf_token: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut builder = HttpClient::builder().cookie_store(true);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            base: Self::base_url(base_url)?,
            csrf_token,
        })
    }

    pub fn from_state(state: &crate::app::AppState) -> Result<Self> {
        Self::with_options(
            &state.base_url,
            state.csrf_token.clone(),
            state.request_timeout_secs.map(Duration::from_secs),
        )
    }

    /// Parses the server URL and makes sure relative joins stay below it.
    fn base_url(input: &str) -> Result<Url> {
        let normalized = crate::utils::normalize_url(input);
        let with_slash = if normalized.ends_with('/') {
            normalized
        } else {
            format!("{normalized}/")
        };
        Url::parse(&with_slash).map_err(|e| ClientError::Config(format!("{input}: {e}")))
    }

    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| ClientError::Config(e.to_string()))
    }

    fn with_csrf(&self, mut req: RequestBuilder) -> RequestBuilder {
        if let Some(token) = &self.csrf_token {
            req = req.header(CSRF_HEADER, token);
        }
        req
    }

    fn check(endpoint: &Url, resp: Response) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            Ok(resp)
        } else {
            Err(ClientError::Status {
                endpoint: endpoint.path().to_string(),
                status: status.as_u16(),
            })
        }
    }

    async fn data<T: DeserializeOwned>(endpoint: &Url, resp: Response) -> Result<T> {
        let body = Self::check(endpoint, resp)?.bytes().await?;
        let envelope: Envelope<T> = serde_json::from_slice(&body)?;
        envelope
            .data
            .ok_or_else(|| ClientError::MissingData(endpoint.path().to_string()))
    }

    /// Logs in with the web form. The session cookie is kept by the client,
    /// and the backend answers a good login with a redirect to the dashboard.
    pub async fn login(&self, email: &str, password: &str) -> Result<()> {
        let endpoint = self.endpoint("login")?;
        let resp = self
            .http
            .post(endpoint.clone())
            .form(&[("email", email), ("password", password)])
            .send()
            .await?;
        let resp = Self::check(&endpoint, resp)?;
        if resp.url().path().ends_with("/dashboard") {
            log::info!("logged in as {email}");
            Ok(())
        } else {
            Err(ClientError::Login("username or password incorrect".into()))
        }
    }

    /// Ends the server session. The cookie store forgets it with the client.
    pub async fn logout(&self) -> Result<()> {
        let endpoint = self.endpoint("logout")?;
        let resp = self.http.get(endpoint.clone()).send().await?;
        Self::check(&endpoint, resp)?;
        log::info!("logged out");
        Ok(())
    }

    /// Registers an account. The backend always answers with the login page,
    /// carrying an error message when the signup was refused.
    pub async fn signup(&self, email: &str, password: &str, confirm_password: &str) -> Result<()> {
        if password != confirm_password {
            return Err(ClientError::Login("Passwords must match".into()));
        }
        let endpoint = self.endpoint("signup")?;
        let resp = self
            .http
            .post(endpoint.clone())
            .form(&[
                ("email", email),
                ("password", password),
                ("confirm_password", confirm_password),
            ])
            .send()
            .await?;
        let page = Self::check(&endpoint, resp)?.text().await?;
        match SIGNUP_REJECTIONS.iter().find(|msg| page.contains(*msg)) {
            Some(msg) => Err(ClientError::Login((*msg).to_string())),
            None => {
                log::info!("registered {email}");
                Ok(())
            }
        }
    }

    pub async fn dashboard(&self) -> Result<Dashboard> {
        let endpoint = self.endpoint("dashboard")?;
        let resp = self.http.get(endpoint.clone()).send().await?;
        let html = Self::check(&endpoint, resp)?.text().await?;
        Ok(parse_dashboard(&html))
    }

    /// Creates a bot and its conversation. The backend redirects back to the
    /// dashboard, so callers reload contacts afterwards.
    pub async fn add_conversation(&self, draft: &ProfileDraft) -> Result<()> {
        let endpoint = self.endpoint("add_conversation")?;
        let prompt = draft.render_prompt();
        let req = self.http.post(endpoint.clone()).form(&[
            ("bot_name", draft.name.trim()),
            ("bot_description", draft.description.trim()),
            ("bot_prompt", prompt.as_str()),
        ]);
        let resp = self.with_csrf(req).send().await?;
        Self::check(&endpoint, resp)?;
        Ok(())
    }
}

#[async_trait]
impl ChatBackend for ApiClient {
    async fn fetch_conversation(&self, id: ConversationId) -> Result<ConversationData> {
        let endpoint = self.endpoint(&format!("conversation/{id}"))?;
        let resp = self
            .with_csrf(self.http.get(endpoint.clone()))
            .send()
            .await?;
        Self::data(&endpoint, resp).await
    }

    async fn send_message(&self, id: ConversationId, text: &str) -> Result<SentData> {
        let endpoint = self.endpoint(&format!("conversation/{id}"))?;
        let req = self.http.post(endpoint.clone()).form(&[("message", text)]);
        let resp = self.with_csrf(req).send().await?;
        Self::data(&endpoint, resp).await
    }

    async fn set_feedback(&self, message_id: MessageId, rating: Rating) -> Result<()> {
        let endpoint = self.endpoint(&format!("feedback/{message_id}"))?;
        let value = rating.get().to_string();
        let req = self
            .http
            .post(endpoint.clone())
            .form(&[("feedback", value.as_str())]);
        let resp = self.with_csrf(req).send().await?;
        Self::check(&endpoint, resp)?;
        Ok(())
    }

    async fn clear_conversation(&self, id: ConversationId) -> Result<()> {
        let endpoint = self.endpoint(&format!("clear_conversation/{id}"))?;
        let resp = self
            .with_csrf(self.http.get(endpoint.clone()))
            .send()
            .await?;
        Self::check(&endpoint, resp)?;
        Ok(())
    }

    async fn save_conversation(&self, id: ConversationId) -> Result<Export> {
        let endpoint = self.endpoint(&format!("save_conversation/{id}"))?;
        let resp = self
            .with_csrf(self.http.get(endpoint.clone()))
            .send()
            .await?;
        let resp = Self::check(&endpoint, resp)?;
        let filename = resp
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(attachment_filename)
            .unwrap_or_else(|| format!("conversation_{id}.csv"));
        let bytes = resp.bytes().await?.to_vec();
        Ok(Export { filename, bytes })
    }

    async fn update_fullname(&self, fullname: &str) -> Result<()> {
        let endpoint = self.endpoint("user/update")?;
        let req = self
            .http
            .post(endpoint.clone())
            .form(&[("fullname", fullname)]);
        let resp = self.with_csrf(req).send().await?;
        Self::check(&endpoint, resp)?;
        Ok(())
    }
}

fn attachment_filename(value: &str) -> Option<String> {
    value
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}

fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join("")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(element: &ElementRef, sel: &Selector) -> String {
    element
        .select(sel)
        .next()
        .map(|e| element_text(&e))
        .unwrap_or_default()
}

/// Reads the contact list out of the dashboard markup. Rows without a
/// numeric id are skipped.
pub fn parse_dashboard(html: &str) -> Dashboard {
    let document = Html::parse_document(html);
    let fullname = document
        .select(&FULLNAME_SEL)
        .next()
        .map(|e| element_text(&e))
        .filter(|name| !name.is_empty());

    let mut contacts = Vec::new();
    for row in document.select(&CONTACT_SEL) {
        let Some(id) = row
            .value()
            .attr("id")
            .and_then(|id| id.trim().parse::<ConversationId>().ok())
        else {
            continue;
        };

        let (preview, preview_from_user) = match row.select(&PREVIEW_SEL).next() {
            Some(el) => {
                let shown = element_text(&el);
                let from_user = shown.starts_with("You:");
                let raw = el
                    .value()
                    .attr("title")
                    .map(str::to_string)
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| {
                        shown
                            .strip_prefix("You:")
                            .map(|s| s.trim_start().to_string())
                            .unwrap_or(shown.clone())
                    });
                if raw.is_empty() || raw == NO_MESSAGES {
                    (None, false)
                } else {
                    (Some(raw), from_user)
                }
            }
            None => (None, false),
        };

        contacts.push(ContactEntry {
            id,
            name: first_text(&row, &NAME_SEL),
            description: first_text(&row, &DESCRIPTION_SEL),
            preview,
            preview_from_user,
            time: first_text(&row, &TIME_SEL),
        });
    }

    Dashboard { fullname, contacts }
}
