use reqwest::RequestBuilder;
use secrecy::{ExposeSecret, SecretString};
use std::fmt::Debug;

/// Supplies the PRTG API credentials for each request.
pub trait CredentialProvider: Debug + Send + Sync {
    fn username(&self) -> &str;
    fn passhash(&self) -> &SecretString;
}

/// Username and pre-computed passhash, as shown in the PRTG account settings.
#[derive(Debug)]
pub struct Passhash {
    pub username: String,
    pub passhash: SecretString,
}

impl Passhash {
    pub fn new<U, P>(username: U, passhash: P) -> Self
    where
        U: Into<String>,
        P: Into<String>,
    {
        Self {
            username: username.into(),
            passhash: SecretString::from(passhash.into()),
        }
    }
}

impl CredentialProvider for Passhash {
    fn username(&self) -> &str {
        &self.username
    }

    fn passhash(&self) -> &SecretString {
        &self.passhash
    }
}

pub trait CredentialInjector {
    fn inject_credentials(self, provider: &dyn CredentialProvider) -> Self;
}

impl CredentialInjector for RequestBuilder {
    fn inject_credentials(self, provider: &dyn CredentialProvider) -> Self {
        self.query(&[
            ("username", provider.username()),
            ("passhash", provider.passhash().expose_secret()),
        ])
    }
}
