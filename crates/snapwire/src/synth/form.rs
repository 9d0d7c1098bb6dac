//! Form objects: named bags of input fields bound as one unit.

use indexmap::IndexMap;
use serde_json::Value as Json;

use crate::codec::{DehydrateContext, Effects, HydrateContext, Meta, SetContext};
use crate::error::Error;
use crate::model::{Form, Segment, Value};
use crate::synth::{meta_str, Synth};

const METHODS: &[&str] = &["reset", "fill"];

/// Synth for [`Value::Form`].
///
/// Inner data is an object of field data; meta `name` names the form.
/// Fields are fixed by the form: writes to undeclared fields fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormSynth;

impl Synth for FormSynth {
    fn matches(&self, value: &Value) -> bool {
        matches!(value, Value::Form(_))
    }

    fn dehydrate(&self, value: &Value, ctx: &mut DehydrateContext<'_>) -> Result<Json, Error> {
        let Value::Form(form) = value else {
            return Err(Error::InvalidValue {
                path: ctx.path().to_string(),
                expected: "form",
                found: value.kind(),
            });
        };
        ctx.add_meta("name", form.name.clone());

        let mut data = serde_json::Map::with_capacity(form.fields.len());
        for (name, field) in &form.fields {
            let segment = Segment::Key(name.clone());
            let hints = ctx.hints().scoped(&segment);
            data.insert(name.clone(), ctx.dehydrate_child(segment, field, hints)?);
        }
        Ok(Json::Object(data))
    }

    fn hydrate(&self, data: Json, meta: &Meta, ctx: &mut HydrateContext<'_>) -> Result<Value, Error> {
        let name = meta_str(meta, "name", ctx.path())?.to_string();
        let Json::Object(data) = data else {
            return Err(Error::malformed(ctx.path(), "form data is not an object"));
        };
        let mut fields = IndexMap::with_capacity(data.len());
        for (field, item) in data {
            let value = ctx.hydrate_child(Segment::Key(field.clone()), item, None)?;
            fields.insert(field, value);
        }
        Ok(Value::Form(Form { name, fields }))
    }

    fn get<'v>(&self, target: &'v Value, key: &Segment) -> Option<&'v Value> {
        match target {
            Value::Form(form) => form.fields.get(key.as_key().as_ref()),
            _ => None,
        }
    }

    fn get_mut<'v>(&self, target: &'v mut Value, key: &Segment) -> Option<&'v mut Value> {
        match target {
            Value::Form(form) => form.fields.get_mut(key.as_key().as_ref()),
            _ => None,
        }
    }

    fn set(&self, target: &mut Value, key: &Segment, value: Value, ctx: &SetContext<'_>) -> Result<(), Error> {
        let Value::Form(form) = target else {
            return Err(ctx.not_found());
        };
        match form.fields.get_mut(key.as_key().as_ref()) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(ctx.not_found()),
        }
    }

    fn methods(&self, target: &Value) -> &'static [&'static str] {
        match target {
            Value::Form(_) => METHODS,
            _ => &[],
        }
    }

    /// `reset(field...)` nulls the listed fields, or every field when none
    /// are listed, and records a `reset` effect naming them.
    /// `fill(values)` assigns from an object or map of field values.
    fn call(
        &self,
        target: &mut Value,
        method: &str,
        params: Vec<Value>,
        effects: &mut Effects,
    ) -> Result<Value, Error> {
        let Value::Form(form) = target else {
            return Err(method_not_found(method, "form"));
        };
        match method {
            "reset" => {
                let names: Vec<String> = if params.is_empty() {
                    form.fields.keys().cloned().collect()
                } else {
                    params
                        .iter()
                        .map(|p| match p {
                            Value::Str(s) => Ok(s.clone()),
                            other => Err(Error::InvalidValue {
                                path: form.name.clone(),
                                expected: "field name",
                                found: other.kind(),
                            }),
                        })
                        .collect::<Result<_, _>>()?
                };
                if let Some(name) = names.iter().find(|n| !form.fields.contains_key(*n)) {
                    return Err(unknown_field(form, name));
                }
                for name in &names {
                    form.fields.insert(name.clone(), Value::Null);
                }
                effects.add("reset", names);
                Ok(Value::Null)
            }
            "fill" => {
                let values = match params.into_iter().next() {
                    Some(Value::Object(map)) | Some(Value::Map(map)) => map,
                    other => {
                        return Err(Error::InvalidValue {
                            path: form.name.clone(),
                            expected: "object of field values",
                            found: other.as_ref().map_or("nothing", Value::kind),
                        });
                    }
                };
                if let Some(name) = values.keys().find(|k| !form.fields.contains_key(*k)) {
                    return Err(unknown_field(form, name));
                }
                for (name, value) in values {
                    form.fields.insert(name, value);
                }
                Ok(Value::Null)
            }
            _ => Err(method_not_found(method, &form.name)),
        }
    }
}

fn unknown_field(form: &Form, name: &str) -> Error {
    Error::PropertyNotFound {
        path: name.to_string(),
        component: form.name.clone(),
    }
}

fn method_not_found(method: &str, path: &str) -> Error {
    Error::MethodNotFound {
        method: method.to_string(),
        path: path.to_string(),
    }
}
