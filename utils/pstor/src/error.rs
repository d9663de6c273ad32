/// All errors that can be returned from the pstor.
#[derive(Debug, snafu::Snafu)]
#[snafu(visibility(pub), context(suffix(false)))]
pub enum Error {
    /// Failed to find an entry with the given key.
    #[snafu(display("Entry with key {} not found.", key))]
    MissingEntry { key: String },
    /// Attempted to modify the store from within a read-only transaction.
    #[snafu(display("Cannot modify entry with key {} from a read-only transaction", key))]
    ReadOnly { key: String },
    /// Failed to deserialise value.
    #[snafu(display("Failed to deserialise value {}. Error {}", value, source))]
    DeserialiseValue {
        value: String,
        source: serde_json::Error,
    },
    /// Failed to serialise value.
    #[snafu(display("Failed to serialise value. Error {}", source))]
    SerialiseValue { source: serde_json::Error },
    /// Failed to read the store document.
    #[snafu(display("Failed to read store document '{}'. Error {}", path, source))]
    Load {
        path: String,
        source: std::io::Error,
    },
    /// Failed to parse the store document.
    #[snafu(display("Failed to parse store document '{}'. Error {}", path, source))]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    /// Failed to write the store document.
    #[snafu(display("Failed to write store document '{}'. Error {}", path, source))]
    Persist {
        path: String,
        source: std::io::Error,
    },
}
