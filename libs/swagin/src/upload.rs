use std::cell::RefCell;

use bytes::Bytes;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

/// Key of the placeholder object standing in for a received file while the
/// body is deserialized.
const UPLOAD_KEY: &str = "$upload";

thread_local! {
    static PENDING: RefCell<Vec<UploadedFile>> = const { RefCell::new(Vec::new()) };
}

/// A file received through a `multipart/form-data` body.
///
/// Declare a body field as `UploadedFile` for a single file or
/// `Vec<UploadedFile>` for every file sent under the same form name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadedFile {
    pub field_name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl UploadedFile {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Repr {
    Pending {
        #[serde(rename = "$upload")]
        upload: usize,
    },
    Inline {
        field_name: String,
        #[serde(default)]
        file_name: Option<String>,
        #[serde(default)]
        content_type: Option<String>,
        #[serde(default)]
        data: Bytes,
    },
}

impl<'de> Deserialize<'de> for UploadedFile {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Pending { upload } => PENDING
                .with(|pending| pending.borrow_mut().get_mut(upload).map(std::mem::take))
                .ok_or_else(|| D::Error::custom(format!("upload #{upload} is not available"))),
            Repr::Inline {
                field_name,
                file_name,
                content_type,
                data,
            } => Ok(UploadedFile {
                field_name,
                file_name,
                content_type,
                data,
            }),
        }
    }
}

/// Placeholder for the `index`-th file handed to [`with_pending`].
pub(crate) fn placeholder(index: usize) -> Value {
    json!({ UPLOAD_KEY: index })
}

/// Runs `f` with `uploads` resolvable through their placeholders, so file
/// contents reach the model without being re-encoded.
pub(crate) fn with_pending<R>(uploads: Vec<UploadedFile>, f: impl FnOnce() -> R) -> R {
    struct Clear;
    impl Drop for Clear {
        fn drop(&mut self) {
            PENDING.with(|pending| pending.borrow_mut().clear());
        }
    }

    PENDING.with(|pending| *pending.borrow_mut() = uploads);
    let _clear = Clear;
    f()
}
