// File: ./src/client/auth.rs
// Request signing and the two-step desktop authorization flow.
use crate::client::core::RtmClient;
use crate::client::service::ServiceError;

/// Error code the service returns for an unknown or revoked token.
const INVALID_TOKEN: u32 = 98;

/// Computes `api_sig`: md5 of the shared secret followed by every
/// parameter name and value, sorted by name.
pub fn sign(shared_secret: &str, params: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort();
    let mut payload = shared_secret.to_string();
    for (key, value) in sorted {
        payload.push_str(key);
        payload.push_str(value);
    }
    format!("{:x}", md5::compute(payload))
}

/// Where the authorization handshake currently stands.
///
/// `AwaitingApproval` is handed back to the caller: the user has to open
/// `url` and allow access before [`RtmClient::complete_auth`] can succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Authorized { token: String },
    AwaitingApproval { frob: String, url: String },
}

impl RtmClient {
    /// Starts authorization. A cached token that still checks out is reused;
    /// otherwise a frob is requested and the approval URL returned.
    pub async fn begin_auth(&mut self, cached_token: Option<&str>) -> Result<AuthState, ServiceError> {
        if let Some(token) = cached_token {
            self.set_token(Some(token.to_string()));
            match self.call("rtm.auth.checkToken", &[]).await {
                Ok(_) => {
                    log::debug!("Cached token accepted");
                    return Ok(AuthState::Authorized {
                        token: token.to_string(),
                    });
                }
                Err(ServiceError::Api { code, .. }) if code == INVALID_TOKEN => {
                    log::info!("Cached token rejected, asking for a new one");
                    self.set_token(None);
                }
                Err(e) => return Err(e),
            }
        }

        let body = self.call("rtm.auth.getFrob", &[]).await?;
        let frob = RtmClient::parse_text(&body, "frob")?;
        let url = self.approval_url(&frob);
        Ok(AuthState::AwaitingApproval { frob, url })
    }

    /// Exchanges an approved frob for a token and starts using it.
    pub async fn complete_auth(&mut self, frob: &str) -> Result<String, ServiceError> {
        let body = self.call("rtm.auth.getToken", &[("frob", frob)]).await?;
        let token = RtmClient::parse_text(&body, "token")?;
        self.set_token(Some(token.clone()));
        Ok(token)
    }

    /// Signed URL the user opens in a browser to allow access.
    pub fn approval_url(&self, frob: &str) -> String {
        let params = vec![
            ("api_key".to_string(), self.api_key().to_string()),
            ("perms".to_string(), self.permissions().to_string()),
            ("frob".to_string(), frob.to_string()),
        ];
        let sig = sign(self.shared_secret(), &params);
        let mut url = match url::Url::parse(self.auth_url()) {
            Ok(u) => u,
            Err(_) => return self.auth_url().to_string(),
        };
        url.query_pairs_mut()
            .extend_pairs(params.iter())
            .append_pair("api_sig", &sig);
        url.to_string()
    }
}
