// Authentication payloads and sign-in response handling
//
// The sign-in endpoint trades email/password for a JWT that is then sent
// as a bearer token. Registration is a plain POST that must answer 201.

use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use crate::error::Error;
use crate::response::ApiResponse;

pub const SIGNIN_PATH: &str = "/auth/signin";
pub const REGISTER_PATH: &str = "/auth/register";

/// Email/password pair used for sign-in and self-registration.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: SecretString) -> Self {
        Self {
            email: email.into(),
            password,
        }
    }

    /// `POST /auth/signin` body.
    pub fn signin_body(&self) -> Value {
        json!({
            "email": self.email,
            "password": self.password.expose_secret(),
        })
    }

    /// `POST /auth/register` body. Self-registered users are named
    /// "Admin Admin"; the password doubles as its confirmation.
    pub fn registration_body(&self) -> Value {
        json!({
            "lastName": "Admin",
            "firstName": "Admin",
            "email": self.email,
            "password": self.password.expose_secret(),
            "passwordConfirmation": self.password.expose_secret(),
        })
    }
}

/// Outcome of a sign-in attempt.
#[derive(Debug)]
pub enum SignIn {
    /// Signed in; the token must be installed as a bearer token.
    Token(SecretString),
    /// `401` -- the account is unknown or the password is wrong.
    Unauthorized,
    /// Any other status.
    Rejected { status: u16, body: Value },
}

impl SignIn {
    pub fn from_response(resp: &ApiResponse) -> Result<Self, Error> {
        match resp.status.as_u16() {
            200..=299 => resp
                .body
                .get("token")
                .and_then(Value::as_str)
                .map(|token| Self::Token(SecretString::from(token.to_owned())))
                .ok_or(Error::MissingToken),
            401 => Ok(Self::Unauthorized),
            status => Ok(Self::Rejected {
                status,
                body: resp.body.clone(),
            }),
        }
    }
}

/// Render the `Authorization` header value for a token.
pub(crate) fn bearer_header(token: &SecretString) -> String {
    format!("bearer {}", token.expose_secret())
}
