use crate::client::validation::ValidationError;
use crate::models::Uid;
use thiserror::Error;

/// Which booking change a mutation reply belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            MutationKind::Create => "create",
            MutationKind::Update => "update",
            MutationKind::Delete => "delete",
        })
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("not logged in")]
    NoSession,
    #[error("no diary selected")]
    NoDiarySelected,
    #[error("no date selected")]
    NoDateSelected,
    #[error("diary {0} is not in the current diary list")]
    UnknownDiary(Uid),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{kind} not supported for this booking ({status})")]
    NotSupported { kind: MutationKind, status: String },
    #[error("server rejected the request: {message}")]
    Rejected { message: String },
    #[error("session rejected by backend")]
    Unauthorized,
    #[error("backend answered {status}: {message}")]
    Status { status: u16, message: String },
    #[error("backend reply for {what} carried no data")]
    MissingData { what: &'static str },
    #[error("backend request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("could not read backend reply: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    /// Text to show the person using the client.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::NoSession | ClientError::Unauthorized => {
                "Not connected to the booking service yet. Retrying in the background.".to_string()
            }
            ClientError::NoDiarySelected => "Please select a diary.".to_string(),
            ClientError::NoDateSelected => "Please select a date.".to_string(),
            ClientError::UnknownDiary(_) => "The selected diary is no longer available.".to_string(),
            ClientError::Validation(err) => err.to_string(),
            ClientError::NotSupported { kind, .. } => match kind {
                MutationKind::Create => "Creating bookings is not supported for this diary.",
                MutationKind::Update => "Booking update is not supported for this entry.",
                MutationKind::Delete => "Cancelling is not supported for this booking.",
            }
            .to_string(),
            ClientError::Rejected { message } => format!("The booking request failed: {message}"),
            ClientError::Http(_)
            | ClientError::Decode(_)
            | ClientError::Status { .. }
            | ClientError::MissingData { .. } => {
                "Failed to communicate with the booking service.".to_string()
            }
        }
    }
}
