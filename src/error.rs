pub type CollageResult<T> = Result<T, CollageError>;

#[derive(thiserror::Error, Debug)]
pub enum CollageError {
    #[error("validation error: {0}")]
    Validation(String),

    /// A raster allocation or transform did not fit in memory. Retriable:
    /// absorbed by the region- and canvas-level downsample ladders and only
    /// surfaces wrapped in [`CollageError::Composition`] once both ladders
    /// are spent.
    #[error("memory exhausted: {0}")]
    MemoryExhausted(String),

    /// The source image file is unreadable or structurally invalid at base
    /// resolution. Non-retriable: aborts the whole composition.
    #[error("region decode error: {0}")]
    RegionDecode(String),

    /// Terminal composition failure, the only composition-path error that
    /// crosses the crate boundary.
    #[error("collage composition failed")]
    Composition(#[source] Box<CollageError>),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CollageError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn memory_exhausted(msg: impl Into<String>) -> Self {
        Self::MemoryExhausted(msg.into())
    }

    pub fn region_decode(msg: impl Into<String>) -> Self {
        Self::RegionDecode(msg.into())
    }

    pub fn composition(cause: CollageError) -> Self {
        Self::Composition(Box::new(cause))
    }

    pub fn is_memory_exhausted(&self) -> bool {
        matches!(self, Self::MemoryExhausted(_))
    }

    /// The failure the composition wrapper carries, if this is one.
    pub fn composition_cause(&self) -> Option<&CollageError> {
        match self {
            Self::Composition(cause) => Some(cause),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            CollageError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(
            CollageError::memory_exhausted("x")
                .to_string()
                .contains("memory exhausted:")
        );
        assert!(
            CollageError::region_decode("x")
                .to_string()
                .contains("region decode error:")
        );
    }

    #[test]
    fn composition_preserves_cause() {
        let err = CollageError::composition(CollageError::memory_exhausted("canvas"));
        assert!(matches!(
            err.composition_cause(),
            Some(CollageError::MemoryExhausted(_))
        ));
        assert!(!err.is_memory_exhausted());
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = CollageError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
