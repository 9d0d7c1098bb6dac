//! Temporary uploads. Only a reference to temporary storage crosses the
//! wire, never file contents.

use serde_json::Value as Json;

use crate::codec::{DehydrateContext, HydrateContext, Meta};
use crate::error::Error;
use crate::limits::MAX_UPLOAD_ID_LEN;
use crate::model::{Path, TemporaryUpload, Value};
use crate::synth::{meta_str, Synth};

const PREFIX: &str = "upload:";

/// Synth for [`Value::Upload`].
///
/// Inner data is `"upload:<id>"`; meta carries `name`, `mime` and `size`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UploadSynth;

impl Synth for UploadSynth {
    fn matches(&self, value: &Value) -> bool {
        matches!(value, Value::Upload(_))
    }

    fn dehydrate(&self, value: &Value, ctx: &mut DehydrateContext<'_>) -> Result<Json, Error> {
        let Value::Upload(upload) = value else {
            return Err(Error::InvalidValue {
                path: ctx.path().to_string(),
                expected: "upload",
                found: value.kind(),
            });
        };
        check_id(&upload.id, ctx.path())?;
        ctx.add_meta("name", upload.original_name.clone());
        ctx.add_meta("mime", upload.mime_type.clone());
        ctx.add_meta("size", upload.size);
        Ok(Json::String(format!("{PREFIX}{}", upload.id)))
    }

    fn hydrate(&self, data: Json, meta: &Meta, ctx: &mut HydrateContext<'_>) -> Result<Value, Error> {
        let id = data
            .as_str()
            .and_then(|s| s.strip_prefix(PREFIX))
            .ok_or_else(|| Error::malformed(ctx.path(), "upload reference lacks the upload: prefix"))?;
        check_id(id, ctx.path())?;

        let size = meta
            .get("size")
            .and_then(Json::as_u64)
            .ok_or_else(|| Error::malformed(ctx.path(), "missing or invalid meta entry"))?;
        Ok(Value::Upload(TemporaryUpload {
            id: id.to_string(),
            original_name: meta_str(meta, "name", ctx.path())?.to_string(),
            mime_type: meta_str(meta, "mime", ctx.path())?.to_string(),
            size,
        }))
    }
}

/// Upload ids name files in temporary storage, so they must never escape it.
fn check_id(id: &str, path: &Path) -> Result<(), Error> {
    if id.len() > MAX_UPLOAD_ID_LEN {
        return Err(Error::LengthExceedsLimit {
            field: "upload id",
            len: id.len(),
            max: MAX_UPLOAD_ID_LEN,
        });
    }
    let charset_ok = id
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'));
    if id.is_empty() || !charset_ok || id.contains("..") {
        return Err(Error::InvalidValue {
            path: path.to_string(),
            expected: "upload id of [A-Za-z0-9._-]",
            found: "string",
        });
    }
    Ok(())
}
