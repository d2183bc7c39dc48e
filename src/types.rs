use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    pub messages: Option<Vec<MessageRef>>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
    #[serde(rename = "resultSizeEstimate")]
    #[allow(dead_code)]
    pub result_size_estimate: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct MessageRef {
    pub id: Option<String>,
    #[serde(rename = "threadId")]
    #[allow(dead_code)]
    pub thread_id: Option<String>,
}

/// One page of inbox message ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePage {
    pub ids: Vec<String>,
    pub next_page_token: Option<String>,
}

impl From<MessagesResponse> for MessagePage {
    fn from(response: MessagesResponse) -> Self {
        let ids = response
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|msg_ref| msg_ref.id)
            .collect();
        MessagePage {
            ids,
            next_page_token: response.next_page_token.filter(|t| !t.is_empty()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ModifyRequest<'a> {
    #[serde(rename = "removeLabelIds")]
    pub remove_label_ids: &'a [&'a str],
}

// Google's JSON error envelope: {"error": {"code", "message", "status", "errors": [...]}}
#[derive(Debug, Deserialize)]
pub struct GoogleErrorResponse {
    pub error: GoogleError,
}

#[derive(Debug, Deserialize)]
pub struct GoogleError {
    pub code: Option<u16>,
    pub message: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub errors: Vec<GoogleErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub struct GoogleErrorDetail {
    pub reason: Option<String>,
    pub message: Option<String>,
}
