//! Gmail OAuth2 authentication
//!
//! Implements the token-refresh side of OAuth2 ([`TokenEndpoint`]) and the
//! interactive authorization code flow used at sign-in. The sign-in flow
//! receives Google's redirect on a loopback TCP listener.

use anyhow::{Context, Result as AnyResult};
use chrono::Utc;
use log::{info, warn};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;

use super::TokenEndpoint;
use super::api::TokenResponse;
use super::client::build_agent;
use crate::config::{GmailCredentials, MailConfig};
use crate::credential::apply_token_response;
use crate::error::{MailError, Result};
use crate::models::{Credential, UserId};

/// OAuth2 client for Google's token endpoint
pub struct GmailAuth {
    client_id: String,
    client_secret: String,
    agent: ureq::Agent,
}

impl GmailAuth {
    const AUTH_URL: &'static str = "https://accounts.google.com/o/oauth2/v2/auth";
    const TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";

    /// Read, label, compose and send
    const GMAIL_MODIFY_SCOPE: &'static str = "https://www.googleapis.com/auth/gmail.modify";

    /// Port range to try for the loopback redirect listener
    const PORT_RANGE_START: u16 = 8080;
    const PORT_RANGE_END: u16 = 8090;

    pub fn new(credentials: GmailCredentials, config: &MailConfig) -> Self {
        Self {
            client_id: credentials.client_id,
            client_secret: credentials.client_secret,
            agent: build_agent(config.request_timeout()),
        }
    }

    /// Run the authorization code flow and return a fresh credential for `user_id`
    ///
    /// Opens the consent page in a browser and blocks until Google redirects
    /// back to the local listener.
    pub fn authorize(&self, user_id: UserId) -> AnyResult<Credential> {
        let (listener, port) = self.start_local_server()?;
        let redirect_uri = format!("http://localhost:{}", port);
        let auth_url = self.authorization_url(&redirect_uri);

        info!("Opening browser for Gmail consent");
        eprintln!("If the browser doesn't open, visit: {}", auth_url);
        if let Err(e) = open::that(&auth_url) {
            warn!("Failed to open browser: {}", e);
        }

        let code = self.wait_for_callback(listener)?;

        info!("Exchanging authorization code for tokens");
        let mut response = self
            .agent
            .post(Self::TOKEN_URL)
            .send_form([
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code.as_str()),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri.as_str()),
            ])
            .context("Failed to exchange authorization code")?;

        if !response.status().is_success() {
            let body = response.body_mut().read_to_string().unwrap_or_default();
            anyhow::bail!("Token exchange rejected ({}): {}", response.status(), body);
        }

        let token: TokenResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse token response")?;
        let refresh_token = token
            .refresh_token
            .clone()
            .context("Google did not return a refresh token")?;

        let blank = Credential::new(user_id, "", refresh_token, Utc::now());
        info!("Signed in as {}", blank.user_id);
        Ok(apply_token_response(&blank, token, Utc::now()))
    }

    fn authorization_url(&self, redirect_uri: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
            Self::AUTH_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(Self::GMAIL_MODIFY_SCOPE),
        )
    }

    fn start_local_server(&self) -> AnyResult<(TcpListener, u16)> {
        for port in Self::PORT_RANGE_START..=Self::PORT_RANGE_END {
            if let Ok(listener) = TcpListener::bind(format!("127.0.0.1:{}", port)) {
                return Ok((listener, port));
            }
        }
        anyhow::bail!(
            "Could not bind to any port in range {}-{}",
            Self::PORT_RANGE_START,
            Self::PORT_RANGE_END
        )
    }

    /// Wait for the redirect and extract the authorization code
    fn wait_for_callback(&self, listener: TcpListener) -> AnyResult<String> {
        let (mut stream, _) = listener.accept().context("Failed to accept connection")?;

        let mut request_line = String::new();
        BufReader::new(&stream)
            .read_line(&mut request_line)
            .context("Failed to read request")?;

        // GET /?code=AUTH_CODE&scope=... HTTP/1.1
        let code = callback_param(&request_line, "code");
        let error = callback_param(&request_line, "error");

        let (status, body) = if code.is_some() {
            ("200 OK", "Signed in. You can close this window.")
        } else {
            ("400 Bad Request", "Sign-in failed. Please try again.")
        };
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n<html><body><h1>{}</h1></body></html>",
            status, body
        );
        stream.write_all(response.as_bytes()).ok();

        if let Some(err) = error {
            anyhow::bail!("OAuth error: {}", err);
        }
        code.context("No authorization code received")
    }
}

impl TokenEndpoint for GmailAuth {
    fn refresh(&self, refresh_token: &str) -> Result<TokenResponse> {
        let mut response = self
            .agent
            .post(Self::TOKEN_URL)
            .send_form([
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .map_err(|e| MailError::RefreshFailed {
                cause: format!("token endpoint unreachable: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.body_mut().read_to_string().unwrap_or_default();
            return Err(MailError::RefreshFailed {
                cause: format!("token endpoint returned {}: {}", status, body.trim()),
            });
        }

        response
            .body_mut()
            .read_json()
            .map_err(|e| MailError::RefreshFailed {
                cause: format!("unreadable token response: {}", e),
            })
    }
}

/// Percent-decoded value of a query parameter in an HTTP request line
fn callback_param(request_line: &str, name: &str) -> Option<String> {
    let path = request_line.split_whitespace().nth(1)?;
    let query = path.split_once('?')?.1;
    query.split('&').find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if key == name {
            urlencoding::decode(value).ok().map(|v| v.into_owned())
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth() -> GmailAuth {
        GmailAuth::new(
            GmailCredentials {
                client_id: "client id".to_string(),
                client_secret: "secret".to_string(),
            },
            &MailConfig::default(),
        )
    }

    #[test]
    fn test_callback_param_decodes_code() {
        let line = "GET /?code=4%2F0AbCd&scope=https%3A%2F%2Fmail HTTP/1.1\r\n";
        assert_eq!(callback_param(line, "code"), Some("4/0AbCd".to_string()));
        assert_eq!(callback_param(line, "error"), None);
    }

    #[test]
    fn test_callback_param_error() {
        let line = "GET /?error=access_denied HTTP/1.1";
        assert_eq!(callback_param(line, "error"), Some("access_denied".to_string()));
        assert_eq!(callback_param(line, "code"), None);
    }

    #[test]
    fn test_callback_param_without_query() {
        assert_eq!(callback_param("GET /favicon.ico HTTP/1.1", "code"), None);
        assert_eq!(callback_param("", "code"), None);
    }

    #[test]
    fn test_authorization_url_is_encoded() {
        let url = auth().authorization_url("http://localhost:8080");
        assert!(url.starts_with(GmailAuth::AUTH_URL));
        assert!(url.contains("client_id=client%20id"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080"));
        assert!(url.contains("access_type=offline"));
    }
}
