//! Logged activities and the request that records one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::duration::IsoDuration;
use crate::core::validation::{
    Kind, PropertyType, ValidationError, validate_optional_property,
    validate_required_property, validate_required_value_object,
};

const LOG_ACTIVITY: &str = "LogActivity";

/// One unit of recorded work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    /// When the activity ended.
    pub timestamp: DateTime<Utc>,
    pub duration: IsoDuration,
    pub client: String,
    pub project: String,
    pub task: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Activity {
    /// Validate a `LogActivity` request body and build the activity.
    pub fn from_request(request: &Value) -> Result<Self, ValidationError> {
        let body = Some(request);
        let text = Some(PropertyType::Primitive(Kind::String));
        let string = |name: &str| -> Result<String, ValidationError> {
            let value = validate_required_property(body, LOG_ACTIVITY, name, text)?;
            Ok(value.as_str().unwrap_or_default().to_string())
        };

        Ok(Self {
            timestamp: validate_required_value_object(body, LOG_ACTIVITY, "timestamp")?,
            duration: validate_required_value_object(body, LOG_ACTIVITY, "duration")?,
            client: string("client")?,
            project: string("project")?,
            task: string("task")?,
            notes: validate_optional_property(body, LOG_ACTIVITY, "notes", text)?
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}
