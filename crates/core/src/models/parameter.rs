use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::BatchError;

/// 作业参数类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParameterType {
    #[serde(rename = "STRING")]
    String,
    #[serde(rename = "INTEGER")]
    Integer,
    #[serde(rename = "FLOAT")]
    Float,
    #[serde(rename = "DATETIME")]
    DateTime,
}

impl ParameterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::String => "STRING",
            ParameterType::Integer => "INTEGER",
            ParameterType::Float => "FLOAT",
            ParameterType::DateTime => "DATETIME",
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParameterType {
    type Err = BatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STRING" => Ok(ParameterType::String),
            "INTEGER" => Ok(ParameterType::Integer),
            "FLOAT" => Ok(ParameterType::Float),
            "DATETIME" => Ok(ParameterType::DateTime),
            _ => Err(BatchError::Serialization(format!(
                "未知的参数类型: {s}"
            ))),
        }
    }
}

/// 带类型的参数值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParameterValue {
    String(String),
    Integer(i64),
    Float(f64),
    #[serde(rename = "DATETIME")]
    DateTime(DateTime<Utc>),
}

impl ParameterValue {
    pub fn parameter_type(&self) -> ParameterType {
        match self {
            ParameterValue::String(_) => ParameterType::String,
            ParameterValue::Integer(_) => ParameterType::Integer,
            ParameterValue::Float(_) => ParameterType::Float,
            ParameterValue::DateTime(_) => ParameterType::DateTime,
        }
    }

    /// 确定性的文本形式，既用于签名也用于持久化
    pub fn canonical(&self) -> String {
        match self {
            ParameterValue::String(s) => s.clone(),
            ParameterValue::Integer(i) => i.to_string(),
            ParameterValue::Float(f) => f.to_string(),
            ParameterValue::DateTime(dt) => dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        }
    }

    /// 从持久化的 (类型, 文本) 还原参数值
    pub fn from_canonical(parameter_type: ParameterType, text: &str) -> Result<Self, BatchError> {
        let value = match parameter_type {
            ParameterType::String => ParameterValue::String(text.to_string()),
            ParameterType::Integer => ParameterValue::Integer(text.parse().map_err(|e| {
                BatchError::Serialization(format!("解析整数参数失败: {text} - {e}"))
            })?),
            ParameterType::Float => ParameterValue::Float(text.parse().map_err(|e| {
                BatchError::Serialization(format!("解析浮点参数失败: {text} - {e}"))
            })?),
            ParameterType::DateTime => ParameterValue::DateTime(
                DateTime::parse_from_rfc3339(text)
                    .map_err(|e| {
                        BatchError::Serialization(format!("解析时间参数失败: {text} - {e}"))
                    })?
                    .with_timezone(&Utc),
            ),
        };
        Ok(value)
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// 作业参数记录，归属于一个作业实例
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobParameter {
    pub key: String,
    pub value: ParameterValue,
}

impl JobParameter {
    pub fn new<S: Into<String>>(key: S, value: ParameterValue) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    pub fn parameter_type(&self) -> ParameterType {
        self.value.parameter_type()
    }
}
