use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A binary file produced by a skill (an `.ics` calendar, a saved Markdown
/// document, ...), offered to the caller for download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Suggested file name, without directories.
    pub filename: String,
    /// MIME type, e.g. "text/calendar".
    pub media_type: String,
    #[serde(with = "bytes_as_vec")]
    pub data: Bytes,
}

impl Artifact {
    pub fn new(filename: impl Into<String>, media_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            media_type: media_type.into(),
            data: data.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Write the artifact into `dir`, returning the full path.
    pub fn save_to(&self, dir: &std::path::Path) -> crate::Result<std::path::PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.filename);
        std::fs::write(&path, &self.data)?;
        Ok(path)
    }
}

mod bytes_as_vec {
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &Bytes, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bytes(data)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Bytes, D::Error> {
        Vec::<u8>::deserialize(d).map(Bytes::from)
    }
}
