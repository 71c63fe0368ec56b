use serde::{Deserialize, Serialize};

/// Connection metadata safe to log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RedactedConnection {
    pub scheme: Option<String>,
    pub user: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub redacted: String,
}

/// Mask passwords in a connection URL and pull out the non-secret parts.
///
/// Strings without a `scheme://` prefix (plain file paths) are returned as-is.
pub fn redact_connection_string(conn: &str) -> RedactedConnection {
    let Some((scheme, rest)) = conn.split_once("://") else {
        return RedactedConnection {
            scheme: None,
            user: None,
            host: None,
            port: None,
            database: None,
            redacted: conn.to_string(),
        };
    };

    let (location, query) = match rest.split_once('?') {
        Some((location, query)) => (location, Some(query)),
        None => (rest, None),
    };
    let (authority, path) = match location.split_once('/') {
        Some((authority, path)) => (authority, path),
        None => (location, ""),
    };
    let (credentials, host_port) = match authority.rsplit_once('@') {
        Some((credentials, host_port)) => (Some(credentials), host_port),
        None => (None, authority),
    };

    let mut user = None;
    let mut masked_credentials = None;
    if let Some(credentials) = credentials {
        match credentials.split_once(':') {
            Some((name, _password)) => {
                user = Some(name.to_string());
                masked_credentials = Some(format!("{name}:***"));
            }
            None => {
                user = Some(credentials.to_string());
                masked_credentials = Some(credentials.to_string());
            }
        }
    }

    let (host, port) = match host_port.rsplit_once(':') {
        Some((host, port)) => (host, port.parse::<u16>().ok()),
        None => (host_port, None),
    };

    let mut redacted = format!("{scheme}://");
    if let Some(credentials) = &masked_credentials {
        redacted.push_str(credentials);
        redacted.push('@');
    }
    redacted.push_str(host_port);
    if location.contains('/') {
        redacted.push('/');
        redacted.push_str(path);
    }
    if let Some(query) = query {
        redacted.push('?');
        redacted.push_str(&redact_query_params(query));
    }

    RedactedConnection {
        scheme: Some(scheme.to_string()),
        user,
        host: (!host.is_empty()).then(|| host.to_string()),
        port,
        database: (!path.is_empty()).then(|| path.to_string()),
        redacted,
    }
}

fn redact_query_params(query: &str) -> String {
    query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if is_sensitive_key(key) => format!("{key}=***"),
            _ => pair.to_string(),
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn is_sensitive_key(key: &str) -> bool {
    matches!(
        key.to_lowercase().as_str(),
        "password" | "pass" | "pwd" | "token" | "sslpassword"
    )
}
