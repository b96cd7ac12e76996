use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatehouseError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("bus: {0}")]
    Bus(String),

    #[error("directory: {0}")]
    Directory(String),

    #[error("access controller: {0}")]
    Board(String),

    #[error("internal: {0}")]
    Internal(#[from] anyhow::Error),
}

impl GatehouseError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::InvalidInput(_) => 400,
            Self::Bus(_) => 502,
            Self::Directory(_) => 502,
            Self::Board(_) => 502,
            Self::Internal(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_call_failures_map_to_5xx() {
        // The dispatcher retries anything non-200, so every downstream
        // failure an effector surfaces must land in the 5xx range.
        assert_eq!(GatehouseError::Bus("reply timeout".into()).http_status(), 502);
        assert_eq!(GatehouseError::Directory("graph 403".into()).http_status(), 502);
        assert_eq!(GatehouseError::Board("device timeout".into()).http_status(), 502);
        assert_eq!(
            GatehouseError::Internal(anyhow::anyhow!("boom")).http_status(),
            500
        );
    }

    #[test]
    fn caller_errors_map_to_4xx() {
        assert_eq!(GatehouseError::NotFound("member 9".into()).http_status(), 404);
        assert_eq!(
            GatehouseError::InvalidInput("member_id is required".into()).http_status(),
            400
        );
    }
}
