//! Inbox and send commands.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::http::{base_url, get_json, post_json_body};

#[derive(Deserialize)]
struct InboxResponse {
    messages: Vec<MessageJson>,
}

#[derive(Deserialize)]
struct MessageJson {
    msg_id: String,
    origin: String,
    relayed_by: String,
    text: String,
    received_at_ms: u64,
}

#[derive(Serialize)]
struct SendMessageRequest {
    to: String,
    text: String,
}

#[derive(Deserialize)]
struct SendMessageResponse {
    msg_id: String,
    timestamp: u64,
}

/// First 16 characters of an id. Ids come off the wire and may not be ASCII.
fn short_id(id: &str) -> String {
    id.chars().take(16).collect()
}

pub async fn cmd_inbox(port: u16) -> Result<()> {
    let resp: InboxResponse = get_json(&format!("{}/inbox", base_url(port))).await?;

    if resp.messages.is_empty() {
        println!("Inbox is empty.");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Inbox ({})", resp.messages.len());
    println!("═══════════════════════════════════════");

    for m in &resp.messages {
        println!("  ┌─ from {} [{}]", m.origin, m.received_at_ms);
        println!("  │  via : {}", m.relayed_by);
        println!("  │  id  : {}", short_id(&m.msg_id));
        println!("  └─ {}", m.text);
    }

    Ok(())
}

pub async fn cmd_send(port: u16, to: &str, text: &str) -> Result<()> {
    let req = SendMessageRequest {
        to: to.to_string(),
        text: text.to_string(),
    };

    let resp: SendMessageResponse =
        post_json_body(&format!("{}/messages/send", base_url(port)), &req).await?;

    println!("Message sent:");
    println!("  ID        : {}", short_id(&resp.msg_id));
    println!("  Timestamp : {}", resp.timestamp);

    Ok(())
}
