use thiserror::Error;

/// Account-store operation failures (spec §7: "transient database errors...
/// surfaced to the caller as a typed account-operation result").
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("account `{0}` not found")]
    NotFound(String),
    #[error("account backend unavailable: {0}")]
    Unavailable(String),
}

/// Join-flow rejections (spec §4.7 step 2, §7 duplicate-join handling).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JoinError {
    #[error("already in this room")]
    AlreadyInRoom,
    #[error("already in another room")]
    AlreadyInAnotherRoom,
    #[error("account unavailable")]
    AccountUnavailable,
    #[error("room is full")]
    RoomFull,
}
