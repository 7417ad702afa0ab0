use replyguard::Config;
use replyguard::memory::PendingReply;
use replyguard::transport::bridge::BridgeStatus;

pub fn render_status(
    config: &Config,
    bridge: Option<&BridgeStatus>,
    store_ok: bool,
    pending: Option<&PendingReply>,
) -> String {
    let bridge_line = match bridge {
        Some(status) if status.ready => "ready".to_string(),
        Some(status) if status.needs_qr => "waiting for QR pairing".to_string(),
        Some(_) => "not ready".to_string(),
        None => "unreachable".to_string(),
    };

    let mut lines = vec![
        "◆ replyguard status".to_string(),
        String::new(),
        format!("Version     {}", env!("CARGO_PKG_VERSION")),
        format!("Workspace   {}", config.workspace_dir.display()),
        format!("Config      {}", config.config_path.display()),
        format!("Policy      {}", config.policy_file().display()),
        String::new(),
        format!("Bridge      {} ({bridge_line})", config.bridge.url),
        format!("Model       {} via {}", config.default_model, config.provider_url),
        format!(
            "API key     {}",
            if config.require_api_key().is_ok() {
                "set"
            } else {
                "missing"
            }
        ),
        format!(
            "Memory      {} ({})",
            config.database_path().display(),
            if store_ok { "healthy" } else { "unavailable" }
        ),
        String::new(),
        format!(
            "Confidence  floor {:.2}, close {:.2}, known {:.2}, unknown {:.2}",
            config.pipeline.confidence_floor,
            config.contacts.close_threshold,
            config.contacts.known_threshold,
            config.contacts.unknown_threshold
        ),
        format!("On conflict {:?}", config.pipeline.on_conflict),
    ];

    match pending {
        Some(p) => lines.push(format!(
            "Pending     {} ({}): {}",
            p.sender_name,
            p.chat_id,
            p.summary.as_deref().unwrap_or(&p.body)
        )),
        None => lines.push("Pending     none".to_string()),
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shows_bridge_state_and_pending() {
        let config = Config::default();
        let status = BridgeStatus {
            ready: false,
            needs_qr: true,
        };
        let pending = PendingReply {
            message_id: "m1".into(),
            chat_id: "1@c.us".into(),
            chat_name: "Sam".into(),
            sender_name: "Sam".into(),
            body: "dinner tonight?".into(),
            summary: None,
            created_at: chrono::Utc::now(),
        };
        let out = render_status(&config, Some(&status), true, Some(&pending));
        assert!(out.contains("waiting for QR pairing"));
        assert!(out.contains("dinner tonight?"));
        assert!(out.contains("API key     missing"));
    }

    #[test]
    fn unreachable_bridge() {
        let out = render_status(&Config::default(), None, false, None);
        assert!(out.contains("unreachable"));
        assert!(out.contains("Pending     none"));
    }
}
