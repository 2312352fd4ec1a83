use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine,
};
use log::{info, warn};
use maplit::hashmap;
use rand::{thread_rng, Rng};
use reqwest::{header::HeaderMap, Client};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpListener,
    time::{timeout, Duration},
};
use url::Url;

use crate::{errors::FitbitError as Error, fitbit_config::FitbitConfig};

const AUTHORIZATION_URI: &str = "https://www.fitbit.com/oauth2/authorize";
const TOKEN_URI: &str = "https://api.fitbit.com/oauth2/token";

const SUCCESS_PAGE: &str = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n\
    <html><body>\
    <h1>You are now authorized to access the Fitbit API!</h1>\
    <br/><h3>You can close this window</h3>\
    </body></html>";
const FAILURE_PAGE: &str = "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html\r\n\r\n\
    <html><body><h1>Authorization failed!</h1></body></html>";

/// Holds the OAuth2 token state for the lifetime of the process, the
/// persisted token file is the only copy that outlives it.
#[derive(Default, Debug, Clone)]
pub struct FitbitAuth {
    pub config: FitbitConfig,
    pub client: Client,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
    pub expires_in: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug)]
struct AccessTokenResponse {
    access_token: String,
    token_type: String,
    expires_in: u64,
    refresh_token: String,
}

impl FitbitAuth {
    pub fn new(config: FitbitConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// # Errors
    /// Return error if the token file does not exist or cannot be read
    pub async fn from_file(config: FitbitConfig) -> Result<Self, Error> {
        let mut auth = Self::new(config);
        if !Path::new(auth.config.fitbit_tokenfile.as_str()).exists() {
            return Err(Error::TokenFileNotFoundError(
                auth.config.fitbit_tokenfile.clone(),
            ));
        }
        let f = File::open(auth.config.fitbit_tokenfile.as_str()).await?;
        let mut b = BufReader::new(f);
        let mut line = String::new();
        loop {
            line.clear();
            if b.read_line(&mut line).await? == 0 {
                break;
            }
            let mut items = line.split('=');
            if let Some(key) = items.next() {
                if let Some(val) = items.next() {
                    match key.trim() {
                        "access_token" => auth.access_token = Some(val.trim().to_string()),
                        "refresh_token" => auth.refresh_token = Some(val.trim().to_string()),
                        "token_type" => auth.token_type = Some(val.trim().to_string()),
                        "expires_in" => auth.expires_in = val.trim().parse().ok(),
                        _ => {}
                    }
                }
            }
        }
        Ok(auth)
    }

    /// # Errors
    /// Return error if the token file cannot be written
    pub async fn to_file(&self) -> Result<(), Error> {
        let mut f = File::create(self.config.fitbit_tokenfile.as_str()).await?;
        if let Some(token) = self.access_token.as_ref() {
            f.write_all(format!("access_token={}\n", token).as_bytes())
                .await?;
        }
        if let Some(token) = self.refresh_token.as_ref() {
            f.write_all(format!("refresh_token={}\n", token).as_bytes())
                .await?;
        }
        if let Some(token_type) = self.token_type.as_ref() {
            f.write_all(format!("token_type={}\n", token_type).as_bytes())
                .await?;
        }
        if let Some(expires_in) = self.expires_in {
            f.write_all(format!("expires_in={}\n", expires_in).as_bytes())
                .await?;
        }
        Ok(())
    }

    fn generate_code_verifier() -> String {
        let random_bytes: Vec<u8> = (0..32).map(|_| thread_rng().gen::<u8>()).collect();
        URL_SAFE_NO_PAD.encode(random_bytes)
    }

    // code_challenge_method=plain, the challenge is the verifier itself
    fn generate_code_challenge(verifier: &str) -> String {
        verifier.to_string()
    }

    /// # Errors
    /// Return error if the authorization URL cannot be constructed
    pub fn get_authorization_url(&self, scopes: &[&str]) -> Result<(Url, String), Error> {
        let code_verifier = Self::generate_code_verifier();
        let code_challenge = Self::generate_code_challenge(&code_verifier);
        let url = Url::parse_with_params(
            AUTHORIZATION_URI,
            &[
                ("client_id", self.config.fitbit_clientid.as_str()),
                ("response_type", "code"),
                ("redirect_uri", self.config.fitbit_redirect_url.as_str()),
                ("scope", scopes.join(" ").as_str()),
                ("code_challenge", code_challenge.as_str()),
                ("code_challenge_method", "plain"),
            ],
        )?;
        Ok((url, code_verifier))
    }

    /// Complete the full authorization flow: direct the user's browser at the
    /// authorization URL, wait for the provider to redirect back to the local
    /// listener, then exchange the captured code for tokens.
    ///
    /// # Errors
    /// Return `AuthorizationError` if no code arrives before the configured
    /// timeout, or an exchange error if the provider rejects the code.
    pub async fn authorize(&mut self, scopes: &[&str]) -> Result<(), Error> {
        let (auth_url, code_verifier) = self.get_authorization_url(scopes)?;

        println!("Opening browser for authorization: {}", auth_url);
        if let Err(e) = webbrowser::open(auth_url.as_str()) {
            warn!("could not open browser, visit the url manually: {}", e);
        }

        let redirect_url: Url = self.config.fitbit_redirect_url.parse()?;
        let port = redirect_url.port().unwrap_or(8080);
        let listener = TcpListener::bind(("127.0.0.1", port)).await?;
        info!("waiting for authorization callback on port {}", port);

        let wait = Duration::from_secs(self.config.callback_timeout_secs);
        let code = capture_authorization_code(listener, wait)
            .await?
            .ok_or(Error::AuthorizationError)?;

        self.exchange_code(&code, &code_verifier).await
    }

    /// # Errors
    /// Return `TokenExchangeError` if the provider rejects the code
    pub async fn exchange_code(&mut self, code: &str, code_verifier: &str) -> Result<(), Error> {
        let headers = self.get_basic_headers()?;
        let data = hashmap! {
            "client_id" => self.config.fitbit_clientid.as_str(),
            "grant_type" => "authorization_code",
            "code" => code,
            "redirect_uri" => self.config.fitbit_redirect_url.as_str(),
            "code_verifier" => code_verifier,
        };
        let resp = self
            .client
            .post(TOKEN_URI)
            .headers(headers)
            .form(&data)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::TokenExchangeError {
                status,
                body: resp.text().await.unwrap_or_default(),
            });
        }
        let auth_resp: AccessTokenResponse = resp.json().await?;
        self.store_tokens(auth_resp);
        Ok(())
    }

    /// Refresh the access token, the provider may rotate the refresh token
    /// so all four fields are overwritten.
    ///
    /// # Errors
    /// Return `NoRefreshTokenError` if no refresh token is stored,
    /// `TokenRefreshError` if the provider rejects the request
    pub async fn refresh_access_token(&mut self) -> Result<(), Error> {
        let refresh_token = self
            .refresh_token
            .clone()
            .ok_or(Error::NoRefreshTokenError)?;
        let headers = self.get_basic_headers()?;
        let data = hashmap! {
            "grant_type" => "refresh_token",
            "refresh_token" => refresh_token.as_str(),
        };
        let resp = self
            .client
            .post(TOKEN_URI)
            .headers(headers)
            .form(&data)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::TokenRefreshError {
                status,
                body: resp.text().await.unwrap_or_default(),
            });
        }
        let auth_resp: AccessTokenResponse = resp.json().await?;
        self.store_tokens(auth_resp);
        Ok(())
    }

    fn store_tokens(&mut self, resp: AccessTokenResponse) {
        self.access_token = Some(resp.access_token);
        self.refresh_token = Some(resp.refresh_token);
        self.token_type = Some(resp.token_type);
        self.expires_in = Some(resp.expires_in);
    }

    fn get_basic_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        headers.insert("Content-type", "application/x-www-form-urlencoded".parse()?);
        headers.insert(
            "Authorization",
            format!(
                "Basic {}",
                STANDARD.encode(format!(
                    "{}:{}",
                    self.config.fitbit_clientid, self.config.fitbit_clientsecret
                ))
            )
            .parse()?,
        );
        Ok(headers)
    }
}

/// Serve exactly one request on `listener` and return the `code` query
/// parameter if the request carried one, `None` if it did not or if no
/// request arrived within `wait`.
///
/// # Errors
/// Return error if accepting or reading the connection fails
pub async fn capture_authorization_code(
    listener: TcpListener,
    wait: Duration,
) -> Result<Option<String>, Error> {
    let (socket, _) = match timeout(wait, listener.accept()).await {
        Ok(result) => result?,
        Err(_) => {
            warn!("no authorization callback received before timeout");
            return Ok(None);
        }
    };
    let (reader, mut writer) = socket.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    reader.read_line(&mut line).await?;

    let code = line
        .split_whitespace()
        .nth(1)
        .and_then(|path| Url::parse(&format!("http://localhost{}", path)).ok())
        .and_then(|url| {
            url.query_pairs().find_map(|(key, val)| {
                if key == "code" {
                    Some(val.into_owned())
                } else {
                    None
                }
            })
        });

    let response = if code.is_some() {
        SUCCESS_PAGE
    } else {
        FAILURE_PAGE
    };
    writer.write_all(response.as_bytes()).await?;
    writer.shutdown().await.ok();

    Ok(code)
}
