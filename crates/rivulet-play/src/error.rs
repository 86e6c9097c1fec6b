use rivulet_abr::QualitySelection;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PlayError {
    #[error("no resource loaded")]
    NotLoaded,

    #[error("rendition not on the quality ladder: {0:?}")]
    UnknownRendition(QualitySelection),

    #[error("segmented transport unavailable: {reason}")]
    Unsupported { reason: String },

    #[error("transport client could not be created: {reason}")]
    TransportInit { reason: String },

    #[error("media element refused to play: {reason}")]
    PlaybackRejected { reason: String },
}

pub type PlayResult<T> = Result<T, PlayError>;
