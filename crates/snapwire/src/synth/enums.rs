//! Backed enum cases.

use rustc_hash::FxHashMap;
use serde_json::Value as Json;

use crate::codec::{DehydrateContext, HydrateContext, Meta, SetContext};
use crate::error::Error;
use crate::model::{EnumCase, Path, Scalar, Value};
use crate::synth::{meta_str, Synth};

/// Synth for [`Value::Enum`].
///
/// Inner data is the backing value; meta `type` names the enum. Enums listed
/// in the catalogue only accept their declared cases, on hydrate and on
/// client update alike. Unlisted enums accept any scalar.
#[derive(Debug, Clone, Default)]
pub struct EnumSynth {
    catalogue: FxHashMap<String, Vec<Scalar>>,
}

impl EnumSynth {
    /// Creates a synth with an empty catalogue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares the valid cases of `enum_type`.
    pub fn allow(mut self, enum_type: impl Into<String>, cases: impl IntoIterator<Item = impl Into<Scalar>>) -> Self {
        self.catalogue
            .insert(enum_type.into(), cases.into_iter().map(Into::into).collect());
        self
    }

    fn case(&self, enum_type: &str, data: &Json, path: &Path) -> Result<EnumCase, Error> {
        let value = Scalar::from_json(data).ok_or_else(|| Error::InvalidValue {
            path: path.to_string(),
            expected: "enum backing value",
            found: json_kind(data),
        })?;
        if let Some(cases) = self.catalogue.get(enum_type) {
            if !cases.contains(&value) {
                return Err(Error::InvalidEnumCase {
                    enum_type: enum_type.to_string(),
                    value: value.to_string(),
                });
            }
        }
        Ok(EnumCase {
            enum_type: enum_type.to_string(),
            value,
        })
    }
}

impl Synth for EnumSynth {
    fn matches(&self, value: &Value) -> bool {
        matches!(value, Value::Enum(_))
    }

    fn dehydrate(&self, value: &Value, ctx: &mut DehydrateContext<'_>) -> Result<Json, Error> {
        let Value::Enum(case) = value else {
            return Err(Error::InvalidValue {
                path: ctx.path().to_string(),
                expected: "enum",
                found: value.kind(),
            });
        };
        ctx.add_meta("type", case.enum_type.clone());
        Ok(case.value.to_json())
    }

    fn hydrate(&self, data: Json, meta: &Meta, ctx: &mut HydrateContext<'_>) -> Result<Value, Error> {
        let enum_type = meta_str(meta, "type", ctx.path())?;
        Ok(Value::Enum(self.case(enum_type, &data, ctx.path())?))
    }

    /// Client updates send the bare backing value; `null` clears the property.
    fn update(&self, current: &Value, data: Json, ctx: &SetContext<'_>) -> Result<Value, Error> {
        let Value::Enum(case) = current else {
            return Ok(Value::from_json(data));
        };
        if data.is_null() {
            return Ok(Value::Null);
        }
        Ok(Value::Enum(self.case(&case.enum_type, &data, ctx.full_path)?))
    }
}

fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}
