use crate::error::PathError;

/// Kind of a message exchanged with a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Populate a placeholder directory's listing.
    EnumerateDirectory,
    /// Fetch a placeholder file's content.
    HydrateFile,
    NotifyFileModified,
    NotifyFileCreated,
    NotifyPreDelete,
    NotifyFileRenamed,
    ResponseSuccess,
    ResponseFail,
}

impl MessageType {
    /// Requests that block the caller until the provider answers.
    pub fn is_hydration(self) -> bool {
        matches!(self, MessageType::EnumerateDirectory | MessageType::HydrateFile)
    }

    /// The terminal outcome carried by a response, if this is one.
    pub fn as_response(self) -> Option<ResponseOutcome> {
        match self {
            MessageType::ResponseSuccess => Some(ResponseOutcome::Success),
            MessageType::ResponseFail => Some(ResponseOutcome::Failure),
            _ => None,
        }
    }
}

/// Terminal answer to a hydration request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseOutcome {
    Success,
    Failure,
}

/// Immutable payload of a request sent to a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMessage {
    pub id: u64,
    pub kind: MessageType,
    pub pid: i32,
    pub process_name: String,
    /// Target path relative to the root, without a leading separator.
    pub relative_path: String,
}

/// Strip `root` and a single leading separator from `path`.
pub fn relative_path<'a>(path: &'a str, root: &str) -> Result<&'a str, PathError> {
    let outside = || PathError::OutsideRoot {
        path: path.to_string(),
        root: root.to_string(),
    };

    let rest = path.strip_prefix(root).ok_or_else(outside)?;
    if rest.is_empty() {
        return Ok(rest);
    }
    match rest.strip_prefix('/') {
        Some(stripped) => Ok(stripped),
        // `/repo2/x` is not inside `/repo`
        None if !root.ends_with('/') => Err(outside()),
        None => Ok(rest),
    }
}
