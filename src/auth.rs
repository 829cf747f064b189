//! OAuth2 credential management for the Gmail and Sheets APIs

use async_trait::async_trait;
use google_gmail1::{hyper_rustls, hyper_util, yup_oauth2, Gmail};
use google_sheets4::Sheets;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use yup_oauth2::authenticator::DefaultAuthenticator;
use yup_oauth2::ApplicationSecret;

use crate::error::{AutomationError, Result};

/// Scopes required by the three workflows
///
/// - gmail.modify: list/read messages, create labels, batch-modify labels
/// - spreadsheets: read sender lists and write statuses
pub const REQUIRED_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.modify",
    "https://www.googleapis.com/auth/spreadsheets",
];

pub const GMAIL_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

pub type HttpsConnector =
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>;

/// Type alias for Gmail Hub to simplify type signatures
pub type GmailHub = Gmail<HttpsConnector>;

/// Type alias for Sheets Hub
pub type SheetsHub = Sheets<HttpsConnector>;

/// An access token good for the required scopes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
}

/// Source of valid credentials; refresh and consent are handled internally
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn get_valid_credential(&self) -> Result<Credential>;
}

/// Installed-app OAuth2 flow with the token persisted to disk
///
/// A missing or unusable token file starts the browser consent flow, with the
/// redirect landing on a local HTTP listener. Expired tokens are refreshed.
#[derive(Clone)]
pub struct OAuthCredentialProvider {
    authenticator: DefaultAuthenticator,
    token_cache: PathBuf,
}

impl OAuthCredentialProvider {
    pub async fn new(
        credentials_path: &Path,
        token_cache_path: &Path,
        redirect_port: u16,
    ) -> Result<Self> {
        let secret = read_client_secret(credentials_path).await?;

        let authenticator = yup_oauth2::InstalledFlowAuthenticator::builder(
            secret,
            yup_oauth2::InstalledFlowReturnMethod::HTTPPortRedirect(redirect_port),
        )
        .persist_tokens_to_disk(token_cache_path)
        .build()
        .await
        .map_err(|e| AutomationError::AuthError(format!("Failed to build authenticator: {}", e)))?;

        Ok(Self {
            authenticator,
            token_cache: token_cache_path.to_path_buf(),
        })
    }

    pub fn authenticator(&self) -> &DefaultAuthenticator {
        &self.authenticator
    }
}

#[async_trait]
impl CredentialProvider for OAuthCredentialProvider {
    async fn get_valid_credential(&self) -> Result<Credential> {
        let token = self
            .authenticator
            .token(REQUIRED_SCOPES)
            .await
            .map_err(|e| AutomationError::AuthError(format!("Failed to obtain token: {}", e)))?;

        let access_token = token
            .token()
            .ok_or_else(|| AutomationError::AuthError("Token has no access token".to_string()))?
            .to_string();

        if tokio::fs::try_exists(&self.token_cache).await? {
            secure_token_file(&self.token_cache).await?;
        }

        debug!("Obtained access token for {} scopes", REQUIRED_SCOPES.len());
        Ok(Credential { access_token })
    }
}

/// Both API hubs, sharing one authenticator and HTTP client
pub struct GoogleHubs {
    pub gmail: GmailHub,
    pub sheets: SheetsHub,
}

/// Authenticate and build the Gmail and Sheets hubs
///
/// The token is requested up front for all scopes so that concurrent calls
/// later never trigger a second consent prompt.
pub async fn initialize_hubs(
    credentials_path: &Path,
    token_cache_path: &Path,
    redirect_port: u16,
) -> Result<GoogleHubs> {
    let provider =
        OAuthCredentialProvider::new(credentials_path, token_cache_path, redirect_port).await?;
    provider.get_valid_credential().await?;
    info!("Authenticated with Google APIs");

    // HTTP/1 works better with the generated hubs than the HTTP/2 default
    let client = hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
        .build(
            hyper_rustls::HttpsConnectorBuilder::new()
                .with_native_roots()
                .map_err(|e| AutomationError::AuthError(format!("Failed to load TLS roots: {}", e)))?
                .https_or_http()
                .enable_http1()
                .build(),
        );

    let authenticator = provider.authenticator().clone();
    Ok(GoogleHubs {
        gmail: Gmail::new(client.clone(), authenticator.clone()),
        sheets: Sheets::new(client, authenticator),
    })
}

/// Read an OAuth2 client secret file
///
/// Accepts both the `installed` (desktop) and `web` shapes downloaded from
/// the Google Cloud console.
pub async fn read_client_secret(path: &Path) -> Result<ApplicationSecret> {
    let content = tokio::fs::read(path).await.map_err(|e| {
        AutomationError::AuthError(format!("Failed to read credentials {:?}: {}", path, e))
    })?;

    yup_oauth2::parse_application_secret(content)
        .map_err(|e| AutomationError::AuthError(format!("Failed to parse credentials: {}", e)))
}

/// Secure token file permissions on Unix systems
///
/// Sets file permissions to 0600 (read/write for owner only)
#[cfg(unix)]
pub async fn secure_token_file(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o600);
    tokio::fs::set_permissions(path, perms).await?;
    Ok(())
}

/// Windows uses ACLs instead of mode bits; nothing to do
#[cfg(windows)]
pub async fn secure_token_file(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_read_client_secret_installed() {
        let credentials_json = r#"{
            "installed": {
                "client_id": "test-client-id",
                "project_id": "test-project",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token",
                "client_secret": "test-secret",
                "redirect_uris": ["http://localhost:8080"]
            }
        }"#;

        let temp_file = NamedTempFile::new().unwrap();
        tokio::fs::write(temp_file.path(), credentials_json)
            .await
            .unwrap();

        let secret = read_client_secret(temp_file.path()).await.unwrap();
        assert_eq!(secret.client_id, "test-client-id");
        assert_eq!(secret.client_secret, "test-secret");
    }

    #[tokio::test]
    async fn test_read_client_secret_web() {
        let credentials_json = r#"{
            "web": {
                "client_id": "web-client-id",
                "project_id": "test-project",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token",
                "client_secret": "web-secret",
                "redirect_uris": ["http://localhost:8080/oauth2callback"]
            }
        }"#;

        let temp_file = NamedTempFile::new().unwrap();
        tokio::fs::write(temp_file.path(), credentials_json)
            .await
            .unwrap();

        let secret = read_client_secret(temp_file.path()).await.unwrap();
        assert_eq!(secret.client_id, "web-client-id");
        assert_eq!(secret.redirect_uris[0], "http://localhost:8080/oauth2callback");
    }

    #[tokio::test]
    async fn test_read_client_secret_missing_file() {
        let result = read_client_secret(Path::new("/tmp/does-not-exist-creds-98231.json")).await;
        assert!(matches!(result, Err(AutomationError::AuthError(_))));
    }

    #[tokio::test]
    async fn test_read_client_secret_garbage() {
        let temp_file = NamedTempFile::new().unwrap();
        tokio::fs::write(temp_file.path(), "{ not json").await.unwrap();

        let result = read_client_secret(temp_file.path()).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Failed to parse credentials"));
    }

    #[tokio::test]
    async fn test_secure_token_file() {
        let temp_file = NamedTempFile::new().unwrap();
        tokio::fs::write(temp_file.path(), "test content")
            .await
            .unwrap();

        secure_token_file(temp_file.path()).await.unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let metadata = tokio::fs::metadata(temp_file.path()).await.unwrap();
            assert_eq!(metadata.permissions().mode() & 0o777, 0o600);
        }
    }

    #[test]
    fn test_scopes_constants() {
        assert_eq!(REQUIRED_SCOPES.len(), 2);
        assert!(REQUIRED_SCOPES.contains(&GMAIL_SCOPE));
        assert!(REQUIRED_SCOPES.contains(&SHEETS_SCOPE));
    }
}
