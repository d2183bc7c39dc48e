use std::collections::HashSet;
use tracing::info;

use super::{error_for_response, GmailClient, MailService, INBOX_LABEL};
use crate::error::Result;
use crate::types::{MessagePage, MessagesResponse};

// Largest page the list endpoint accepts
const PAGE_SIZE: &str = "500";

// Fetch one page of message ids carrying the inbox label
pub async fn fetch_inbox_page(
    gmail: &GmailClient,
    page_token: Option<&str>,
) -> Result<MessagePage> {
    let mut query = vec![("labelIds", INBOX_LABEL), ("maxResults", PAGE_SIZE)];
    if let Some(token) = page_token {
        query.push(("pageToken", token));
    }

    let response = gmail
        .client
        .get(gmail.url("messages"))
        .bearer_auth(&gmail.token)
        .query(&query)
        .send()
        .await?;

    if response.status().is_success() {
        let messages_data: MessagesResponse = response.json().await?;
        Ok(messages_data.into())
    } else {
        Err(error_for_response(response).await)
    }
}

/// Collect every inbox message id, following page tokens until the last page.
///
/// Ids are returned once each, in the order the service listed them.
pub async fn list_inbox<M: MailService + ?Sized>(service: &M) -> Result<Vec<String>> {
    info!("Fetching emails from INBOX...");
    let mut message_ids = Vec::new();
    let mut seen = HashSet::new();
    let mut page_token: Option<String> = None;

    loop {
        let page = service.list_inbox_page(page_token.take()).await?;
        if page.ids.is_empty() {
            if message_ids.is_empty() {
                info!("No messages found in INBOX.");
            }
            break;
        }

        info!("Fetched {} email IDs from this page.", page.ids.len());
        for id in page.ids {
            if seen.insert(id.clone()) {
                message_ids.push(id);
            }
        }

        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    info!("Total email IDs fetched from INBOX: {}", message_ids.len());
    Ok(message_ids)
}
