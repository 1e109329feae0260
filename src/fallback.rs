//! Fallback decoding
//!
//! Decodes a JSON object into a typed record while keeping every field the
//! record does not declare. The declared field names and the per-key nested
//! decode instructions are plain data handed to the decoder.

use crate::encode;
use crate::error::{PrefsError, Result};
use crate::types::Document;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

type Decoded = Box<dyn Any + Send + Sync>;
type NestedDecode = Arc<dyn Fn(&str, &Value) -> Result<Decoded> + Send + Sync>;

/// Decoder for records of type `T` with a side map of undeclared fields
pub struct FallbackDecoder<T> {
    known_fields: HashSet<String>,
    instructions: HashMap<String, NestedDecode>,
    _record: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> FallbackDecoder<T> {
    /// `known_fields` are the JSON keys `T` declares, after any serde renames
    pub fn new<I, S>(known_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known_fields: known_fields.into_iter().map(Into::into).collect(),
            instructions: HashMap::new(),
            _record: PhantomData,
        }
    }

    /// Decode the undeclared object field `key` into `U`
    pub fn instruction<U>(mut self, key: &str) -> Self
    where
        U: DeserializeOwned + Send + Sync + 'static,
    {
        let decode: NestedDecode = Arc::new(|key: &str, value: &Value| -> Result<Decoded> {
            let decoded: U =
                serde_json::from_value(value.clone()).map_err(|source| PrefsError::Fallback {
                    key: key.to_string(),
                    source,
                })?;
            Ok(Box::new(decoded) as Decoded)
        });
        self.instructions.insert(key.to_string(), decode);
        self
    }

    /// Decode the undeclared object field `key` with a nested fallback decoder,
    /// yielding a `FallbackRecord<U>`
    pub fn instruction_with<U>(mut self, key: &str, decoder: FallbackDecoder<U>) -> Self
    where
        U: DeserializeOwned + Send + Sync + 'static,
    {
        let decoder = Arc::new(decoder);
        let decode: NestedDecode = Arc::new(move |key: &str, value: &Value| -> Result<Decoded> {
            let decoded = decoder.decode(value).map_err(|err| match err {
                PrefsError::Serialization(source) => PrefsError::Fallback {
                    key: key.to_string(),
                    source,
                },
                other => other,
            })?;
            Ok(Box::new(decoded) as Decoded)
        });
        self.instructions.insert(key.to_string(), decode);
        self
    }

    pub fn known_fields(&self) -> &HashSet<String> {
        &self.known_fields
    }

    /// Decode `value` into the record and its extras
    ///
    /// Undeclared `null` fields are dropped. Undeclared objects go through
    /// their instruction when one is registered; everything else is kept raw.
    /// A value that is not an object yields the record with no extras.
    pub fn decode(&self, value: &Value) -> Result<FallbackRecord<T>> {
        let record: T = serde_json::from_value(value.clone())?;
        let mut extras = Extras::default();

        let Value::Object(fields) = value else {
            return Ok(FallbackRecord { record, extras });
        };

        for (key, field) in fields {
            if self.known_fields.contains(key) {
                continue;
            }
            match field {
                Value::Null => {}
                Value::Object(_) => {
                    if let Some(decode) = self.instructions.get(key) {
                        let decoded = decode(key, field)?;
                        extras.decoded.insert(key.clone(), decoded);
                    }
                    extras.fields.insert(key.clone(), field.clone());
                }
                _ => {
                    extras.fields.insert(key.clone(), field.clone());
                }
            }
        }

        Ok(FallbackRecord { record, extras })
    }
}

impl<T> fmt::Debug for FallbackDecoder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut instructions: Vec<&String> = self.instructions.keys().collect();
        instructions.sort();
        f.debug_struct("FallbackDecoder")
            .field("known_fields", &self.known_fields)
            .field("instructions", &instructions)
            .finish()
    }
}

/// A decoded record plus the fields it does not declare
#[derive(Debug)]
pub struct FallbackRecord<T> {
    pub record: T,
    pub extras: Extras,
}

impl<T: Serialize> FallbackRecord<T> {
    /// Re-encode the record with its extras; record fields win on conflict
    pub fn to_value(&self) -> Result<Value> {
        let mut value = encode::to_value(&self.record)?;
        if let Value::Object(map) = &mut value {
            for (key, field) in &self.extras.fields {
                if !map.contains_key(key) {
                    map.insert(key.clone(), field.clone());
                }
            }
        }
        Ok(value)
    }
}

/// Undeclared fields in input order, with typed values for instructed keys
#[derive(Default)]
pub struct Extras {
    fields: Document,
    decoded: HashMap<String, Decoded>,
}

impl Extras {
    /// Raw JSON of an extra field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Typed value produced by the instruction registered for `key`
    pub fn get_typed<U: 'static>(&self, key: &str) -> Option<&U> {
        self.decoded
            .get(key)
            .and_then(|decoded| (**decoded).downcast_ref::<U>())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Set a raw extra field; `null` removes it
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        self.decoded.remove(&key);
        if value.is_null() {
            self.fields.shift_remove(&key);
        } else {
            self.fields.insert(key, value);
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.decoded.remove(key);
        self.fields.shift_remove(key)
    }

    pub fn as_document(&self) -> &Document {
        &self.fields
    }
}

impl fmt::Debug for Extras {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extras")
            .field("fields", &self.fields)
            .field("decoded", &self.decoded.keys().collect::<Vec<_>>())
            .finish()
    }
}
