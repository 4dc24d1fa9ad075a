//! 按路径读取接口返回的json，如`"Items.DBInstance"`

use crate::error::Error;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub trait ValueExt {
    fn get_path(&self, path: &str) -> Option<&Value>;

    /// 字符串或数字都会转为字符串
    fn get_str_path(&self, path: &str) -> Option<String>;

    /// 兼容字符串形式的数字
    fn get_u64_path(&self, path: &str) -> Option<u64>;

    /// 兼容`"true"`/`"false"`
    fn get_bool_path(&self, path: &str) -> Option<bool>;

    /// 只有一个元素的时候有些接口返回的是对象而不是数组，这里统一处理成数组
    fn get_array_path(&self, path: &str) -> Vec<Value>;

    fn unmarshal_path<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error>;
}

impl ValueExt for Value {
    fn get_path(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return Some(self);
        }
        path.split('.').try_fold(self, |v, key| v.get(key))
    }

    fn get_str_path(&self, path: &str) -> Option<String> {
        match self.get_path(path)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    fn get_u64_path(&self, path: &str) -> Option<u64> {
        match self.get_path(path)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    fn get_bool_path(&self, path: &str) -> Option<bool> {
        match self.get_path(path)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    fn get_array_path(&self, path: &str) -> Vec<Value> {
        match self.get_path(path) {
            Some(Value::Array(arr)) => arr.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(v) => vec![v.clone()],
        }
    }

    fn unmarshal_path<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let v = self
            .get_path(path)
            .ok_or_else(|| Error::Common(format!("missing field {path}")))?;
        Ok(T::deserialize(v)?)
    }
}
