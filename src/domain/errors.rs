// Domain-level errors reported by the ports.

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Encode(String),
    Decode(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

#[derive(Debug)]
pub enum EngineError {
    // Model resources never finished loading.
    NotLoaded,
    // Input raster has no pixels to start from.
    MissingPixels,
    // No image came back from a run that reported success.
    EmptyOutput,
    Encode(String),
    Upstream(String),
    Decode(String),
}
