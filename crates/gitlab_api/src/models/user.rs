//! Identity returned for the owner of the access token.

use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct User {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
}
