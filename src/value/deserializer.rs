use crate::error::Error;
use crate::value::Value;
use indexmap::map;
use serde::de::{self, DeserializeOwned, Deserializer, IntoDeserializer, MapAccess, SeqAccess, Visitor};

/// Reads a template [`Value`] back into a host type, e.g. the result of a
/// `capture` or a value produced by a custom tag.
pub struct ValueDeserializer<'a> {
    pub value: &'a Value,
}

impl<'a> ValueDeserializer<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self { value }
    }
}

impl<'de, 'a> Deserializer<'de> for ValueDeserializer<'a> {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.value {
            Value::None => visitor.visit_unit(),
            Value::Bool(v) => visitor.visit_bool(*v),
            Value::Int(v) => visitor.visit_i64(*v),
            Value::Float(v) => visitor.visit_f64(*v),
            Value::Str(v) => visitor.visit_str(v),
            Value::List(v) | Value::Tuple(v) => visitor.visit_seq(ListAccess { iter: v.iter() }),
            Value::Set(s) => visitor.visit_seq(ListAccess {
                iter: s.iter().collect::<Vec<_>>().into_iter(),
            }),
            Value::Dict(d) => visitor.visit_map(DictAccess {
                iter: d.iter(),
                current: None,
            }),
            other @ (Value::Object(_) | Value::Func(_)) => Err(Error::render(format!(
                "cannot convert '{}' to a host value",
                other.type_name()
            ))),
        }
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.value {
            Value::None => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.value {
            Value::Str(s) => visitor.visit_enum(s.as_str().into_deserializer()),
            other => Err(Error::render(format!(
                "expected a variant name, got '{}'",
                other.type_name()
            ))),
        }
    }

    fn deserialize_newtype_struct<V>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_ignored_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_unit()
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 u8 u16 u32 u64 f32 f64 char str string
        unit seq tuple tuple_struct map struct identifier
        unit_struct bytes byte_buf
    }
}

struct ListAccess<I> {
    iter: I,
}

impl<'de, 'a, I> SeqAccess<'de> for ListAccess<I>
where
    I: Iterator<Item = &'a Value>,
{
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>, Self::Error>
    where
        T: de::DeserializeSeed<'de>,
    {
        match self.iter.next() {
            Some(value) => seed.deserialize(ValueDeserializer { value }).map(Some),
            None => Ok(None),
        }
    }
}

struct DictAccess<'a> {
    iter: map::Iter<'a, Value, Value>,
    current: Option<&'a Value>,
}

impl<'de, 'a> MapAccess<'de> for DictAccess<'a> {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>, Self::Error>
    where
        K: de::DeserializeSeed<'de>,
    {
        if let Some((k, v)) = self.iter.next() {
            self.current = Some(v);
            seed.deserialize(ValueDeserializer { value: k }).map(Some)
        } else {
            Ok(None)
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, Self::Error>
    where
        V: de::DeserializeSeed<'de>,
    {
        let value = self
            .current
            .take()
            .ok_or_else(|| Error::render("Map value requested before key"))?;
        seed.deserialize(ValueDeserializer { value })
    }
}

pub fn from_value<T: DeserializeOwned>(value: &Value) -> Result<T, Error> {
    T::deserialize(ValueDeserializer::new(value))
}
