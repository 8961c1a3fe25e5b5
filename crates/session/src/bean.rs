use std::{any::Any, sync::Arc};

use indexmap::IndexMap;
use serde_json::Value;
use shared::{error::DispatchError, transfer::MAX_ITEM_INDEX};

/// User data object held by a page instance.
pub trait PageBean: Send + 'static {
    fn write_property(
        &mut self,
        property: &str,
        index: Option<usize>,
        values: &[String],
    ) -> Result<(), DispatchError>;

    fn read_property(&self, property: &str) -> Option<Value>;

    /// Serialisable view of the whole bean.
    fn snapshot(&self) -> Value;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

pub type BeanFactory = Arc<dyn Fn() -> Box<dyn PageBean> + Send + Sync>;

/// Property bag bean. Indexed writes land in an array slot of the property.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapBean {
    properties: IndexMap<String, Value>,
}

impl MapBean {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(property.into(), value.into());
        self
    }

    pub fn get(&self, property: &str) -> Option<&Value> {
        self.properties.get(property)
    }

    pub fn set(&mut self, property: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(property.into(), value.into());
    }

    pub fn factory(template: MapBean) -> BeanFactory {
        Arc::new(move || Box::new(template.clone()) as Box<dyn PageBean>)
    }
}

fn decode(values: &[String]) -> Value {
    match values {
        [] => Value::Null,
        [single] => Value::String(single.clone()),
        many => Value::Array(many.iter().cloned().map(Value::String).collect()),
    }
}

impl PageBean for MapBean {
    fn write_property(
        &mut self,
        property: &str,
        index: Option<usize>,
        values: &[String],
    ) -> Result<(), DispatchError> {
        let value = decode(values);
        let Some(index) = index else {
            self.properties.insert(property.to_string(), value);
            return Ok(());
        };

        let len = index
            .checked_add(1)
            .filter(|_| index <= MAX_ITEM_INDEX)
            .ok_or_else(|| DispatchError::ItemIndexOutOfRange {
                property: property.to_string(),
                index,
            })?;
        let slot = self
            .properties
            .entry(property.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if !slot.is_array() {
            *slot = Value::Array(Vec::new());
        }
        if let Value::Array(items) = slot {
            if items.len() <= index {
                items.resize(len, Value::Null);
            }
            items[index] = value;
        }
        Ok(())
    }

    fn read_property(&self, property: &str) -> Option<Value> {
        self.properties.get(property).cloned()
    }

    fn snapshot(&self) -> Value {
        Value::Object(
            self.properties
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        )
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn indexed_writes_fill_array_slots() {
        let mut bean = MapBean::new();
        bean.write_property("name", Some(2), &["Bob".into()])
            .expect("write");
        bean.write_property("name", Some(1), &["Ada".into()])
            .expect("write");
        assert_eq!(bean.get("name"), Some(&json!([null, "Ada", "Bob"])));
    }

    #[test]
    fn out_of_range_indices_are_rejected_without_growing() {
        let mut bean = MapBean::new();
        for index in [MAX_ITEM_INDEX + 1, usize::MAX] {
            let err = bean
                .write_property("name", Some(index), &["x".into()])
                .expect_err("out of range");
            assert!(matches!(err, DispatchError::ItemIndexOutOfRange { .. }));
        }
        assert_eq!(bean.read_property("name"), None);
    }

    #[test]
    fn multi_valued_write_becomes_array() {
        let mut bean = MapBean::new().with("tags", "old");
        bean.write_property("tags", None, &["a".into(), "b".into()])
            .expect("write");
        assert_eq!(bean.read_property("tags"), Some(json!(["a", "b"])));
    }

    #[test]
    fn factory_yields_fresh_defaults() {
        let factory = MapBean::factory(MapBean::new().with("count", 0));
        let mut first = factory();
        first
            .write_property("count", None, &["9".into()])
            .expect("write");
        assert_eq!(factory().snapshot(), json!({"count": 0}));
    }
}
