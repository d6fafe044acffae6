use std::fmt;
use std::str::FromStr;

use crate::error::StorageError;

/// Location of one object, written by hosts as `"<bucket>/<object>"`.
///
/// The first `/` is the delimiter; later slashes belong to the object name
/// and are not escaped. A path without a separator, or with an empty bucket
/// or object part, is rejected at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectPath {
    bucket: String,
    object: String,
}

impl ObjectPath {
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn object(&self) -> &str {
        &self.object
    }
}

impl FromStr for ObjectPath {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((bucket, object)) if !bucket.is_empty() && !object.is_empty() => Ok(ObjectPath {
                bucket: bucket.to_owned(),
                object: object.to_owned(),
            }),
            _ => Err(StorageError::InvalidPath(s.to_owned())),
        }
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.object)
    }
}

/// One contiguous byte range of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub offset: u64,
    pub len: u64,
}

impl ByteRange {
    pub fn end(&self) -> u64 {
        self.offset + self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_at_first_slash_only() {
        let path = ObjectPath::from_str("bucket/dir/a/b.dat").unwrap();
        assert_eq!(path.bucket(), "bucket");
        assert_eq!(path.object(), "dir/a/b.dat");
        assert_eq!(path.to_string(), "bucket/dir/a/b.dat");
    }

    #[test]
    fn rejects_paths_without_separator() {
        assert!(matches!(
            ObjectPath::from_str("no-separator"),
            Err(StorageError::InvalidPath(_))
        ));
    }

    #[test]
    fn rejects_empty_bucket_or_object() {
        assert!(ObjectPath::from_str("/object").is_err());
        assert!(ObjectPath::from_str("bucket/").is_err());
        assert!(ObjectPath::from_str("/").is_err());
    }
}
