/// Errors raised by core operations.
///
/// The first group is the user-facing taxonomy: every variant there is expected during normal
/// operation and is turned into a notice at the request boundary. The second group covers
/// infrastructure failures, which are logged and reported to users only in generic terms.
#[derive(Debug, thiserror::Error)]
pub enum HmsError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("not authorised: {0}")]
    NotAuthorized(String),
    #[error("this time slot is already taken")]
    SlotTaken,
    #[error("doctor account is pending admin approval")]
    PendingApproval,
    #[error("doctor profile not found")]
    ProfileMissing,
    #[error("no shipping address on the patient profile")]
    MissingAddress,
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("username {0} is already taken")]
    UsernameTaken(String),

    #[error("failed to hash password: {0}")]
    PasswordHash(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("failed to run migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl HmsError {
    /// Text suitable for showing to the person who made the request.
    ///
    /// Infrastructure errors are collapsed into a generic message; their detail belongs in the
    /// logs, not in a notice.
    pub fn user_message(&self) -> String {
        match self {
            HmsError::Validation(msg) => msg.clone(),
            HmsError::NotFound(what) => {
                let mut what = what.clone();
                if let Some(first) = what.get_mut(0..1) {
                    first.make_ascii_uppercase();
                }
                format!("{what} not found.")
            }
            HmsError::NotAuthorized(msg) => format!("You are not authorised to {msg}."),
            HmsError::SlotTaken => "This time slot is already taken.".into(),
            HmsError::PendingApproval => "Your Doctor account is pending admin approval.".into(),
            HmsError::ProfileMissing => "Doctor profile not found. Please contact admin.".into(),
            HmsError::MissingAddress => {
                "Please add an address to your profile before placing an order.".into()
            }
            HmsError::InvalidCredentials => "Invalid username or password.".into(),
            HmsError::UsernameTaken(_) => {
                "Username is already taken. Please choose a different one.".into()
            }
            HmsError::PasswordHash(_) | HmsError::Database(_) | HmsError::Migration(_) => {
                "An internal error occurred. Please try again.".into()
            }
        }
    }

    /// Whether the error reflects an infrastructure fault rather than a rejected request.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            HmsError::PasswordHash(_) | HmsError::Database(_) | HmsError::Migration(_)
        )
    }
}

pub type HmsResult<T> = std::result::Result<T, HmsError>;

/// Returns true when a storage error is a uniqueness-constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
