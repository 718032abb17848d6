use crate::settings::error::SettingsError;
use engine_core::notify::WebhookEndpoint;

/// Parses a comma separated list of `url` or `event_type=url` entries.
pub fn parse_webhooks(raw: &str) -> Result<Vec<WebhookEndpoint>, SettingsError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(parse_entry)
        .collect()
}

fn parse_entry(entry: &str) -> Result<WebhookEndpoint, SettingsError> {
    // query strings may contain '=', so a bare URL is checked first
    if is_http_url(entry) {
        return Ok(WebhookEndpoint::new(entry));
    }

    match entry.split_once('=') {
        Some((event_type, url)) if !event_type.trim().is_empty() && is_http_url(url.trim()) => {
            Ok(WebhookEndpoint::for_event(url.trim(), event_type.trim()))
        }
        _ => Err(SettingsError::InvalidWebhook(entry.to_string())),
    }
}

fn is_http_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}
