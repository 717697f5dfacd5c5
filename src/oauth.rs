//! Installed-app OAuth for the Gmail and Sheets APIs.
//!
//! A refresh token is kept in the OS keyring between runs; without one the
//! user is sent through the browser consent flow on a loopback redirect.
use crate::errors::{AppError, AppResult};
use oauth2::basic::BasicClient;
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    PkceCodeVerifier, RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use std::env;
use std::fs;
use std::io::Write;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{info, warn};

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const SERVICE_NAME: &str = "inboxsheet-google-oauth";

pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

pub fn default_scopes() -> Vec<Scope> {
    vec![
        Scope::new(GMAIL_READONLY_SCOPE.into()),
        Scope::new(SHEETS_SCOPE.into()),
    ]
}

/// Returns a bearer token for the given scopes, refreshing or re-consenting as needed.
pub async fn authorize_with_scopes(scopes: &[Scope], token_key: &str) -> AppResult<String> {
    let creds = load_credentials()?;
    let token_store = TokenStore::from_key(token_key);

    if let Some(refresh) = token_store.load() {
        let client = build_client(&creds, "http://127.0.0.1")?;
        if let Some(access) = try_refresh(&client, refresh).await {
            return Ok(access);
        }
        warn!(key = %token_key, "Stored refresh token failed; re-authenticating");
        token_store.delete();
    }

    let listener = TcpListener::bind(("127.0.0.1", 0))
        .await
        .map_err(|e| AppError::Unexpected(format!("failed to bind loopback port: {e}")))?;
    let local_port = listener
        .local_addr()
        .map(|addr| addr.port())
        .map_err(|e| AppError::Unexpected(format!("failed to read local addr: {e}")))?;

    let redirect = format!("http://127.0.0.1:{local_port}");
    let client = build_client(&creds, &redirect)?;

    let (auth_url, verifier, csrf) = build_auth_url(&client, scopes);
    info!(redirect = %redirect, "Opening browser for Google OAuth consent");
    open_in_browser(&auth_url);

    let code = listen_for_code(listener).await?;
    if code.state != *csrf.secret() {
        return Err(AppError::AuthExpired);
    }

    let token_res = client
        .exchange_code(AuthorizationCode::new(code.code))
        .set_pkce_verifier(verifier)
        .request_async(async_http_client)
        .await
        .map_err(|e| AppError::Network(format!("token exchange failed: {e}")))?;

    if let Some(refresh) = token_res.refresh_token() {
        token_store.save(refresh.secret())?;
    }
    Ok(token_res.access_token().secret().to_string())
}

struct InstalledCreds {
    client_id: String,
    client_secret: String,
}

fn load_credentials() -> AppResult<InstalledCreds> {
    let client_id = env::var("GOOGLE_CLIENT_ID")
        .map_err(|_| AppError::Config("GOOGLE_CLIENT_ID missing".into()))?;
    let client_secret = env::var("GOOGLE_CLIENT_SECRET")
        .map_err(|_| AppError::Config("GOOGLE_CLIENT_SECRET missing".into()))?;
    Ok(InstalledCreds {
        client_id,
        client_secret,
    })
}

fn build_client(creds: &InstalledCreds, redirect: &str) -> AppResult<BasicClient> {
    let auth_url = AuthUrl::new(AUTH_URL.to_string())
        .map_err(|e| AppError::Config(format!("invalid auth url: {e}")))?;
    let token_url = TokenUrl::new(TOKEN_URL.to_string())
        .map_err(|e| AppError::Config(format!("invalid token url: {e}")))?;
    let redirect = RedirectUrl::new(redirect.to_string())
        .map_err(|e| AppError::Config(format!("invalid redirect uri {redirect}: {e}")))?;

    Ok(BasicClient::new(
        ClientId::new(creds.client_id.clone()),
        Some(ClientSecret::new(creds.client_secret.clone())),
        auth_url,
        Some(token_url),
    )
    .set_redirect_uri(redirect)
    .set_auth_type(oauth2::AuthType::RequestBody))
}

fn build_auth_url(client: &BasicClient, scopes: &[Scope]) -> (String, PkceCodeVerifier, CsrfToken) {
    let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
    let mut req = client
        .authorize_url(CsrfToken::new_random)
        .add_extra_param("access_type", "offline")
        .add_extra_param("prompt", "consent")
        .set_pkce_challenge(challenge);
    for scope in scopes {
        req = req.add_scope(scope.clone());
    }
    let (url, csrf) = req.url();
    (url.to_string(), verifier, csrf)
}

async fn try_refresh(client: &BasicClient, refresh_token: String) -> Option<String> {
    let refresh = RefreshToken::new(refresh_token);
    match client
        .exchange_refresh_token(&refresh)
        .request_async(async_http_client)
        .await
    {
        Ok(token_res) => Some(token_res.access_token().secret().to_string()),
        Err(err) => {
            warn!("Refresh token invalid or expired: {err}");
            None
        }
    }
}

struct CodeResponse {
    code: String,
    state: String,
}

async fn listen_for_code(listener: TcpListener) -> AppResult<CodeResponse> {
    let (mut stream, _) = listener
        .accept()
        .await
        .map_err(|e| AppError::Unexpected(format!("redirect accept failed: {e}")))?;

    let mut buf = [0u8; 4096];
    let n = stream
        .read(&mut buf)
        .await
        .map_err(|e| AppError::Unexpected(format!("reading auth callback failed: {e}")))?;
    let req = String::from_utf8_lossy(&buf[..n]);
    let path = req
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .ok_or_else(|| AppError::Unexpected("invalid HTTP request".into()))?;
    let parsed = url::Url::parse(&format!("http://localhost{path}"))
        .map_err(|e| AppError::Unexpected(format!("failed to parse callback url: {e}")))?;

    let param = |name: &str| {
        parsed
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.to_string())
    };
    let code = param("code")
        .ok_or_else(|| AppError::Unexpected("callback missing code parameter".into()))?;
    let state = param("state").unwrap_or_default();

    let response =
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\nAuth complete. You can close this tab.";
    let _ = stream.write_all(response.as_bytes()).await;
    Ok(CodeResponse { code, state })
}

fn open_in_browser(url: &str) {
    let attempt = if cfg!(target_os = "macos") {
        std::process::Command::new("open").arg(url).status()
    } else if cfg!(target_os = "windows") {
        std::process::Command::new("rundll32.exe")
            .args(["url.dll,FileProtocolHandler", url])
            .status()
    } else {
        std::process::Command::new("xdg-open").arg(url).status()
    };
    if let Err(e) = attempt {
        warn!("Could not auto-open browser: {e}. Open this URL manually:\n{url}");
    } else {
        println!("If your browser did not open, navigate to:\n{url}");
    }
}

struct TokenStore {
    key: String,
}

impl TokenStore {
    fn from_key(key: &str) -> Self {
        Self {
            key: key.to_string(),
        }
    }

    fn load(&self) -> Option<String> {
        let entry = match keyring::Entry::new(SERVICE_NAME, &self.key) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Keyring unavailable: {e}");
                return None;
            }
        };
        match entry.get_password() {
            Ok(token) => Some(token),
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                warn!("Keyring read failed: {e}");
                None
            }
        }
    }

    fn save(&self, refresh: &str) -> AppResult<()> {
        let saved = keyring::Entry::new(SERVICE_NAME, &self.key)
            .and_then(|entry| entry.set_password(refresh));
        if let Err(e) = saved {
            warn!("Keyring save failed ({e}); writing to temp file as fallback");
            self.save_file(refresh)?;
        }
        Ok(())
    }

    fn delete(&self) {
        if let Ok(entry) = keyring::Entry::new(SERVICE_NAME, &self.key) {
            let _ = entry.delete_password();
        }
    }

    fn save_file(&self, refresh: &str) -> AppResult<()> {
        let tmp = env::temp_dir().join(format!("inboxsheet_token_{}.txt", self.key));

        let mut file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)
            .map_err(|e| AppError::Unexpected(format!("opening temp token file: {e}")))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = file.set_permissions(fs::Permissions::from_mode(0o600));
        }

        file.write_all(refresh.as_bytes())
            .map_err(|e| AppError::Unexpected(format!("writing token file: {e}")))?;
        warn!(
            path = %tmp.display(),
            "Refresh token saved to temp file due to keyring issues; it will not be reused automatically"
        );
        Ok(())
    }
}
