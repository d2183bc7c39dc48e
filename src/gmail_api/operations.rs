use super::{error_for_response, GmailClient, INBOX_LABEL};
use crate::error::Result;
use crate::types::ModifyRequest;

// Archive a message by removing the INBOX label
pub async fn archive_message(gmail: &GmailClient, message_id: &str) -> Result<()> {
    let modify_url = gmail.url(&format!("messages/{}/modify", message_id));

    let request_body = ModifyRequest {
        remove_label_ids: &[INBOX_LABEL],
    };

    let response = gmail
        .client
        .post(&modify_url)
        .bearer_auth(&gmail.token)
        .json(&request_body)
        .send()
        .await?;

    if response.status().is_success() {
        Ok(())
    } else {
        Err(error_for_response(response).await)
    }
}
