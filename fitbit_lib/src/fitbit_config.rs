use std::{env::var, ops::Deref, path::Path, sync::Arc};

use crate::errors::FitbitError as Error;

/// `FitbitConfig` holds configuration information which can be set either
/// through environment variables or the config.env file, see the dotenvy
/// crate for more information about the config file format.
#[derive(Default, Debug)]
pub struct FitbitConfigInner {
    pub home_dir: String,
    pub pgurl: String,
    pub fitbit_clientid: String,
    pub fitbit_clientsecret: String,
    pub fitbit_redirect_url: String,
    pub fitbit_tokenfile: String,
    pub callback_timeout_secs: u64,
}

#[derive(Default, Debug, Clone)]
pub struct FitbitConfig(Arc<FitbitConfigInner>);

macro_rules! set_config_from_env {
    ($s:ident, $id:ident) => {
        if let Ok($id) = var(&stringify!($id).to_uppercase()) {
            $s.$id = $id.into()
        }
    };
}

macro_rules! set_config_parse_default {
    ($s:ident, $id:ident, $d:expr) => {
        $s.$id = var(&stringify!($id).to_uppercase())
            .ok()
            .and_then(|x| x.parse().ok())
            .unwrap_or_else(|| $d);
    };
}

impl FitbitConfigInner {
    /// Some variables have natural default values, which we set in the new()
    /// method.
    pub fn new() -> Self {
        let home_dir = dirs::home_dir().unwrap_or_else(|| Path::new("/tmp").to_path_buf());
        let fitbit_tokenfile = home_dir
            .join(".fitbit_tokens")
            .to_string_lossy()
            .to_string();

        Self {
            fitbit_redirect_url: "http://localhost:8080/redirect".to_string(),
            fitbit_tokenfile,
            callback_timeout_secs: 300,
            home_dir: home_dir.to_string_lossy().to_string(),
            ..Self::default()
        }
    }

    /// Each variable maps to an environment variable, if the variable exists,
    /// use it.
    pub fn from_env(mut self) -> Self {
        set_config_from_env!(self, pgurl);
        set_config_from_env!(self, fitbit_clientid);
        set_config_from_env!(self, fitbit_clientsecret);
        set_config_from_env!(self, fitbit_redirect_url);
        set_config_from_env!(self, fitbit_tokenfile);
        set_config_parse_default!(self, callback_timeout_secs, 300);
        self
    }
}

impl FitbitConfig {
    pub fn new() -> Self {
        Self(Arc::new(FitbitConfigInner::new()))
    }

    /// Pull configuration from a file if it exists,
    /// first look for a config.env file in the current directory,
    /// then try `${HOME}/.config/fitbit_rust/config.env`,
    /// if that doesn't exist fall back on the default behaviour of dotenvy.
    ///
    /// # Errors
    /// Return error if required variables aren't set appropriately.
    pub fn get_config(fname: Option<&str>) -> Result<Self, Error> {
        let config_dir = dirs::config_dir()
            .ok_or(Error::StaticCustomError("No CONFIG directory"))?;
        let default_fname = config_dir.join("fitbit_rust").join("config.env");

        let env_file = match fname.map(Path::new) {
            Some(fname) if fname.exists() => fname,
            _ => &default_fname,
        };

        dotenvy::dotenv().ok();

        if env_file.exists() {
            dotenvy::from_path(env_file).ok();
        } else if Path::new("config.env").exists() {
            dotenvy::from_filename("config.env").ok();
        }

        let conf = FitbitConfigInner::new().from_env();

        if conf.pgurl.is_empty() {
            Err(Error::StaticCustomError("No PGURL specified"))
        } else if conf.fitbit_clientid.is_empty() {
            Err(Error::StaticCustomError("No FITBIT_CLIENTID specified"))
        } else if conf.fitbit_clientsecret.is_empty() {
            Err(Error::StaticCustomError("No FITBIT_CLIENTSECRET specified"))
        } else {
            Ok(Self(Arc::new(conf)))
        }
    }
}

impl From<FitbitConfigInner> for FitbitConfig {
    fn from(inner: FitbitConfigInner) -> Self {
        Self(Arc::new(inner))
    }
}

impl Deref for FitbitConfig {
    type Target = FitbitConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
