use crate::models::session::User;
use secrecy::Secret;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Login form posted by the browser.
#[derive(Deserialize, Validate)]
pub struct LoginForm {
    #[validate(email(message = "Informe um e-mail válido"))]
    pub email: String,
    #[validate(length(min = 1, message = "Informe a senha"))]
    pub password: String,
}

impl LoginForm {
    /// Split a validated form, moving the password out of plain memory.
    pub fn into_credentials(self) -> (String, Secret<String>) {
        (self.email, Secret::new(self.password))
    }
}

/// Success body of `POST /auth/login` and `POST /auth/refresh`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    /// Refresh responses may omit the user; the stored one is kept then.
    #[serde(default)]
    pub user: Option<User>,
    #[serde(alias = "access_token", alias = "access")]
    pub token: String,
    #[serde(default, alias = "refresh_token", alias = "refresh")]
    pub refresh_token: Option<String>,
    /// Lifetime of `token` in seconds.
    #[serde(default, alias = "expires_in")]
    pub expires_in: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use secrecy::ExposeSecret;

    #[test]
    fn token_response_accepts_snake_case_backend() {
        let body = r#"{
            "user": {"id": 3, "email": "x@sas.org", "name": "X", "role": "viewer"},
            "access_token": "a",
            "refresh_token": "r",
            "expires_in": 900
        }"#;

        let tokens: TokenResponse = serde_json::from_str(body).unwrap();
        assert_eq!(tokens.token, "a");
        assert_eq!(tokens.refresh_token.as_deref(), Some("r"));
        assert_eq!(tokens.expires_in, Some(900));
        assert_eq!(tokens.user.unwrap().role, Role::Viewer);
    }

    #[test]
    fn login_form_rejects_bad_email_and_empty_password() {
        let form = LoginForm {
            email: "not-an-email".into(),
            password: String::new(),
        };

        let errors = form.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }

    #[test]
    fn valid_form_yields_credentials() {
        let form = LoginForm {
            email: "ana@sas.org".into(),
            password: "segredo".into(),
        };

        assert!(form.validate().is_ok());
        let (email, password) = form.into_credentials();
        assert_eq!(email, "ana@sas.org");
        assert_eq!(password.expose_secret(), "segredo");
    }
}
