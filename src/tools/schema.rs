//! 动作参数 JSON Schema：schemars 生成 + 派发前校验
//!
//! 每个动作的参数结构体派生 JsonSchema，生成的 schema 一方面注入 system prompt，
//! 另一方面在注册时编译为 jsonschema 校验器，派发前校验模型给出的原始参数。

use jsonschema::{Draft, JSONSchema};
use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::core::AgentError;

/// 无参数动作使用的 schema
pub fn empty_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {},
        "required": []
    })
}

/// 由参数类型生成 JSON Schema
pub fn schema_of<T: JsonSchema>() -> Value {
    serde_json::to_value(schema_for!(T)).unwrap_or_else(|_| empty_schema())
}

/// schema 中的必填字段
pub fn required_fields(schema: &Value) -> Vec<&str> {
    schema
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

/// 编译后的参数校验器：每个动作注册时编译一次（Draft 7，与 schemars 输出一致）
pub struct ArgsValidator {
    compiled: JSONSchema,
    accepts_empty: bool,
}

impl ArgsValidator {
    pub fn compile(schema: &Value) -> Result<Self, String> {
        let compiled = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(schema)
            .map_err(|e| format!("schema compile: {e}"))?;
        Ok(Self {
            compiled,
            accepts_empty: required_fields(schema).is_empty(),
        })
    }

    /// 校验原始参数；返回第一条人类可读的诊断信息
    ///
    /// - null 视为 `{}`
    /// - schema 没有必填字段时，空参数直接通过
    pub fn validate(&self, args: &Value) -> Result<(), String> {
        let empty = Value::Object(Map::new());
        let args = if args.is_null() { &empty } else { args };
        if self.accepts_empty && args.as_object().is_some_and(Map::is_empty) {
            return Ok(());
        }
        if let Err(errors) = self.compiled.validate(args) {
            let first = errors
                .into_iter()
                .next()
                .map(|err| {
                    let path = err.instance_path.to_string();
                    if path.is_empty() {
                        err.to_string()
                    } else {
                        format!("{path}: {err}")
                    }
                })
                .unwrap_or_else(|| "schema validation failed".to_string());
            return Err(first);
        }
        Ok(())
    }
}

/// 一次性校验（编译 + 校验）；热路径请用注册时编译好的 ArgsValidator
pub fn validate_args(schema: &Value, args: &Value) -> Result<(), String> {
    ArgsValidator::compile(schema)?.validate(args)
}

/// 把（已校验的）参数反序列化为具体类型；null 视为 `{}`
pub fn parse_args<T: DeserializeOwned>(action: &str, args: Value) -> Result<T, AgentError> {
    let args = if args.is_null() {
        Value::Object(Map::new())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| AgentError::Validation {
        action: action.to_string(),
        message: e.to_string(),
    })
}
