use serde::Deserialize;
use serde_json::Value;
use validator::Validate;

use super::repo_types::ProfileUpdate;

/// Profile edit; password keys are accepted only to be refused with a pointer.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMeRequest {
    #[validate(length(min = 1, message = "A user must have a name."))]
    pub name: Option<String>,
    #[validate(email(message = "Please provide a valid email."))]
    pub email: Option<String>,
    #[validate(length(min = 1, message = "A photo reference cannot be empty."))]
    pub photo: Option<String>,
    pub password: Option<Value>,
    pub password_confirm: Option<Value>,
}

impl UpdateMeRequest {
    pub fn touches_password(&self) -> bool {
        self.password.is_some() || self.password_confirm.is_some()
    }

    pub fn into_update(self) -> ProfileUpdate {
        ProfileUpdate {
            name: self.name.map(|n| n.trim().to_string()),
            email: self.email.map(|e| e.trim().to_lowercase()),
            photo: self.photo,
        }
    }
}
