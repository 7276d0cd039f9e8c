use super::{
    field::{DecodeOptions, FieldType, Value, decode_field, encode_field},
    packetizer::Packetizer,
};
use crate::error::{Error, Result};

/// An ordered list of named fields. The order is the wire order.
#[derive(Debug, Clone, Copy)]
pub struct PacketSchema {
    fields: &'static [(&'static str, FieldType)],
}

const fn str_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i] {
            return false;
        }
        i += 1;
    }
    true
}

impl PacketSchema {
    /// Panics if two fields share a name. Schemas are constants, so this is
    /// caught at compile time.
    pub const fn new(fields: &'static [(&'static str, FieldType)]) -> Self {
        let mut i = 0;
        while i < fields.len() {
            let mut j = i + 1;
            while j < fields.len() {
                if str_eq(fields[i].0, fields[j].0) {
                    panic!("duplicate field name in packet schema");
                }
                j += 1;
            }
            i += 1;
        }
        Self { fields }
    }

    pub fn fields(&self) -> &'static [(&'static str, FieldType)] {
        self.fields
    }
}

/// Named field values going into or coming out of a packet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Values {
    entries: Vec<(&'static str, Value)>,
}

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &'static str, value: impl Into<Value>) -> Self {
        self.insert(name, value.into());
        self
    }

    pub fn insert(&mut self, name: &'static str, value: Value) {
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn take(&mut self, name: &'static str) -> Result<Value> {
        let index = self
            .entries
            .iter()
            .position(|(n, _)| *n == name)
            .ok_or(Error::MissingField(name))?;
        Ok(self.entries.remove(index).1)
    }

    pub fn int(&self, name: &'static str) -> Result<i64> {
        match self.get(name) {
            Some(Value::Int(v)) => Ok(*v),
            Some(_) => Err(Error::malformed(name, "not an integer")),
            None => Err(Error::MissingField(name)),
        }
    }

    pub fn long(&self, name: &'static str) -> Result<u64> {
        match self.get(name) {
            Some(Value::Long(v)) => Ok(*v),
            Some(_) => Err(Error::malformed(name, "not a u64")),
            None => Err(Error::MissingField(name)),
        }
    }

    pub fn take_string(&mut self, name: &'static str) -> Result<String> {
        match self.take(name)? {
            Value::Str(s) => Ok(s),
            _ => Err(Error::malformed(name, "not a string")),
        }
    }

    pub fn take_strings(&mut self, name: &'static str) -> Result<Vec<String>> {
        match self.take(name)? {
            Value::StrArray(s) => Ok(s),
            _ => Err(Error::malformed(name, "not a string array")),
        }
    }

    pub fn take_bytes(&mut self, name: &'static str) -> Result<Vec<u8>> {
        match self.take(name)? {
            Value::Bytes(b) => Ok(b),
            _ => Err(Error::malformed(name, "not bytes")),
        }
    }
}

/// A schema bound to the envelope it's sent in.
pub struct PacketDefinition<P> {
    pub schema: PacketSchema,
    pub packetizer: P,
}

impl<P: Packetizer> PacketDefinition<P> {
    pub const fn new(fields: &'static [(&'static str, FieldType)], packetizer: P) -> Self {
        Self {
            schema: PacketSchema::new(fields),
            packetizer,
        }
    }

    pub fn encode(&self, values: &Values) -> Result<Vec<u8>> {
        let mut parts = Vec::with_capacity(self.schema.fields().len());
        for &(name, field_type) in self.schema.fields() {
            let value = match (values.get(name), field_type) {
                (Some(value), _) => value,
                // a magic is a constant, there's nothing for the caller to supply
                (None, FieldType::Magic(_)) => &Value::Flag(true),
                (None, _) => return Err(Error::MissingField(name)),
            };
            parts.push(encode_field(name, field_type, value)?);
        }
        Ok(self.packetizer.wrap(parts))
    }

    pub fn decode(&self, frame: &[u8], options: &DecodeOptions) -> Result<Values> {
        let payload = self.packetizer.unwrap(frame)?;

        let mut values = Values::new();
        let mut offset = 0;
        for &(name, field_type) in self.schema.fields() {
            let (value, consumed) = decode_field(name, field_type, payload, offset, options)?;
            if consumed == 0 {
                return Err(Error::ZeroProgress(name));
            }
            offset += consumed;
            values.insert(name, value);
        }

        if offset != payload.len() {
            return Err(Error::TrailingBytes(payload.len() - offset));
        }
        Ok(values)
    }
}
