//! 作业参数类型推断与规范签名
//!
//! 原始输入是字符串键值对。每个值按固定顺序探测类型：
//! 日期时间 -> 整数 -> 浮点数 -> 字符串，第一个解析成功的类型胜出。
//! 签名是按键排序后的 `[键, 类型, 规范值]` 三元组 JSON 数组，
//! 两个参数集相等当且仅当签名逐字节相同。

use std::collections::BTreeMap;

use batch_core::{BatchError, BatchResult, JobParameter, ParameterValue};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const NAIVE_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// 推断单个原始值的类型
pub fn infer_value(raw: &str) -> ParameterValue {
    if let Some(datetime) = parse_datetime(raw) {
        return ParameterValue::DateTime(datetime);
    }

    if let Ok(integer) = raw.parse::<i64>() {
        return ParameterValue::Integer(integer);
    }

    if let Ok(float) = raw.parse::<f64>() {
        if float.is_finite() {
            return ParameterValue::Float(float);
        }
    }

    ParameterValue::String(raw.to_string())
}

fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(raw) {
        return Some(datetime.with_timezone(&Utc));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// 类型化且按键有序的参数集
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobParameters {
    values: BTreeMap<String, ParameterValue>,
}

impl JobParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从原始键值对构建，空键或重复键返回 `InvalidParameters`
    pub fn from_raw<I, K, V>(raw: I) -> BatchResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut values = BTreeMap::new();
        for (key, value) in raw {
            let key = key.as_ref();
            if key.trim().is_empty() {
                return Err(BatchError::invalid_params("参数键不能为空"));
            }
            if values
                .insert(key.to_string(), infer_value(value.as_ref()))
                .is_some()
            {
                return Err(BatchError::invalid_params(format!("参数键重复: {key}")));
            }
        }
        Ok(Self { values })
    }

    /// 从仓储中读出的已类型化参数重建
    pub fn from_persisted(parameters: Vec<JobParameter>) -> BatchResult<Self> {
        let mut values = BTreeMap::new();
        for parameter in parameters {
            if values
                .insert(parameter.key.clone(), parameter.value)
                .is_some()
            {
                return Err(BatchError::invalid_params(format!(
                    "参数键重复: {}",
                    parameter.key
                )));
            }
        }
        Ok(Self { values })
    }

    /// 规范签名，作为作业实例的 job_key
    pub fn signature(&self) -> String {
        let triples = self
            .values
            .iter()
            .map(|(key, value)| {
                serde_json::json!([key, value.parameter_type().as_str(), value.canonical()])
            })
            .collect();
        serde_json::Value::Array(triples).to_string()
    }

    pub fn get(&self, key: &str) -> Option<&ParameterValue> {
        self.values.get(key)
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(ParameterValue::String(value)) => Some(value),
            _ => None,
        }
    }

    pub fn get_integer(&self, key: &str) -> Option<i64> {
        match self.values.get(key) {
            Some(ParameterValue::Integer(value)) => Some(*value),
            _ => None,
        }
    }

    /// 整数参数也可按浮点读取
    pub fn get_float(&self, key: &str) -> Option<f64> {
        match self.values.get(key) {
            Some(ParameterValue::Float(value)) => Some(*value),
            Some(ParameterValue::Integer(value)) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn get_datetime(&self, key: &str) -> Option<DateTime<Utc>> {
        match self.values.get(key) {
            Some(ParameterValue::DateTime(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// 按键排序的持久化形式
    pub fn to_vec(&self) -> Vec<JobParameter> {
        self.values
            .iter()
            .map(|(key, value)| JobParameter::new(key.clone(), value.clone()))
            .collect()
    }
}
