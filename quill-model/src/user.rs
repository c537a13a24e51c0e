use uuid::Uuid;

use crate::audit::Audit;

/// Profile subset of a user row. Credentials and session state live with
/// the auth service and are not mapped here.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct User {
    pub id: Uuid,
    pub row_version: i64,

    pub username: String,
    pub email: String,

    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub description: Option<String>,
    pub profile_image_key: Option<String>,
    pub profile_banner_key: Option<String>,

    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub audit: Audit,
}
