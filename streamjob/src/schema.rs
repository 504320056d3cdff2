//! Declared configuration of a streaming job and its child resources, as written by the user.
//!
//! Attribute names follow the provisioning tool's snake_case schema. `JobConfiguration::validate`
//! enforces the constraints the schema layer promises before any lifecycle operation runs; the
//! `expand` conversions turn declarations into management API bodies.

use crate::error::{Error, Result};
use crate::models::{
    Datasource, Function, FunctionInput, FunctionOutput, FunctionProperties, Input,
    InputProperties, Output, OutputProperties, ScalarFunctionProperties, Serialization,
    SerializationProperties, SkuProperty, StreamingJob, StreamingJobProperties, Transformation,
    TransformationProperties,
};
use crate::types::{EventsOutOfOrderPolicy, Sku, Tags};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

const CSV_DELIMITERS: &[&str] = &[",", ";", "\t", "|", " "];
const JAVASCRIPT_UDF_BINDING: &str = "Microsoft.StreamAnalytics/JavascriptUdf";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfiguration {
    pub name: String,
    pub sku: Sku,
    pub resource_group_name: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events_out_of_order_max_delay_in_seconds: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events_out_of_order_policy: Option<EventsOutOfOrderPolicy>,
    /// Optional and computed: refreshed from the remote job on every read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformation: Option<TransformationDeclaration>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub job_input: Vec<InputDeclaration>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub job_output: Vec<OutputDeclaration>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub function: Vec<FunctionDeclaration>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransformationDeclaration {
    pub name: String,
    pub streaming_units: i32,
    pub query: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputKind {
    Stream,
    Reference,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputDeclaration {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: InputKind,
    pub datasource: DatasourceDeclaration,
    pub serialization: SerializationDeclaration,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputDeclaration {
    pub name: String,
    pub datasource: DatasourceDeclaration,
    pub serialization: SerializationDeclaration,
}

/// A datasource is an ARM type string plus whatever properties that type takes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasourceDeclaration {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    #[default]
    #[serde(rename = "UTF8")]
    Utf8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JsonFormat {
    LineSeparated,
    Array,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SerializationDeclaration {
    Json {
        #[serde(default)]
        encoding: Encoding,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<JsonFormat>,
    },
    Csv {
        field_delimiter: String,
        #[serde(default)]
        encoding: Encoding,
    },
    Avro,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FunctionDeclaration {
    pub name: String,
    /// JavaScript UDF body, e.g. `function (x) { return x * 2; }`.
    pub script: String,
    /// Parameter data types in call order.
    #[serde(default)]
    pub inputs: Vec<String>,
    pub output: String,
}

impl JobConfiguration {
    pub fn validate(&self) -> Result<()> {
        require_non_empty("name", &self.name)?;
        require_non_empty("resource_group_name", &self.resource_group_name)?;
        require_non_empty("location", &self.location)?;

        if let Some(delay) = self.events_out_of_order_max_delay_in_seconds {
            if delay < 0 || delay > i64::from(i32::MAX) {
                return Err(Error::InvalidConfiguration(format!(
                    "events_out_of_order_max_delay_in_seconds must be between 0 and {}, got {}",
                    i32::MAX,
                    delay
                )));
            }
        }

        unique_names("function", self.function.iter().map(|f| f.name.as_str()))?;
        unique_names("job_input", self.job_input.iter().map(|i| i.name.as_str()))?;
        unique_names("job_output", self.job_output.iter().map(|o| o.name.as_str()))?;

        for function in &self.function {
            require_non_empty("function.script", &function.script)?;
        }
        for input in &self.job_input {
            check_serialization(&input.serialization)?;
        }
        for output in &self.job_output {
            check_serialization(&output.serialization)?;
        }
        if let Some(transformation) = &self.transformation {
            require_non_empty("transformation.name", &transformation.name)?;
            check_streaming_units(transformation.streaming_units)?;
        }
        Ok(())
    }

    /// Builds the job descriptor submitted before any child resource.
    ///
    /// Out-of-order settings and tags are only sent when declared. A delay that does not fit the
    /// API's 32-bit field is an error, not a silent omission.
    pub fn expand_job(&self) -> Result<StreamingJob> {
        let max_delay = self
            .events_out_of_order_max_delay_in_seconds
            .map(|delay| {
                i32::try_from(delay).map_err(|_| {
                    Error::InvalidConfiguration(format!(
                        "events_out_of_order_max_delay_in_seconds {} does not fit in 32 bits",
                        delay
                    ))
                })
            })
            .transpose()?;
        let properties = StreamingJobProperties {
            sku: Some(SkuProperty { name: self.sku }),
            events_out_of_order_max_delay_in_seconds: max_delay,
            events_out_of_order_policy: self.events_out_of_order_policy,
            ..Default::default()
        };
        Ok(StreamingJob {
            name: Some(self.name.clone()),
            location: Some(self.location.clone()),
            tags: expand_tags(&self.tags),
            properties: Some(properties),
            ..Default::default()
        })
    }
}

pub fn expand_tags(tags: &Tags) -> Option<Tags> {
    if tags.is_empty() {
        None
    } else {
        Some(tags.clone())
    }
}

pub fn flatten_tags(tags: Option<Tags>) -> Tags {
    tags.unwrap_or_default()
}

impl FunctionDeclaration {
    pub fn expand(&self) -> Function {
        let mut binding = Map::new();
        binding.insert("script".into(), Value::String(self.script.clone()));
        Function {
            name: Some(self.name.clone()),
            properties: Some(FunctionProperties {
                kind: "Scalar".into(),
                properties: Some(ScalarFunctionProperties {
                    inputs: self
                        .inputs
                        .iter()
                        .map(|data_type| FunctionInput {
                            data_type: data_type.clone(),
                        })
                        .collect(),
                    output: Some(FunctionOutput {
                        data_type: self.output.clone(),
                    }),
                    binding: Some(Datasource {
                        kind: JAVASCRIPT_UDF_BINDING.into(),
                        properties: binding,
                    }),
                }),
            }),
            ..Default::default()
        }
    }
}

impl InputDeclaration {
    pub fn expand(&self) -> Result<Input> {
        let kind = match self.kind {
            InputKind::Stream => "Stream",
            InputKind::Reference => "Reference",
        };
        Ok(Input {
            name: Some(self.name.clone()),
            properties: Some(InputProperties {
                kind: kind.into(),
                datasource: Some(self.datasource.expand()),
                serialization: Some(self.serialization.expand()?),
            }),
            ..Default::default()
        })
    }
}

impl OutputDeclaration {
    pub fn expand(&self) -> Result<Output> {
        Ok(Output {
            name: Some(self.name.clone()),
            properties: Some(OutputProperties {
                datasource: Some(self.datasource.expand()),
                serialization: Some(self.serialization.expand()?),
            }),
            ..Default::default()
        })
    }
}

impl TransformationDeclaration {
    pub fn expand(&self) -> Transformation {
        Transformation {
            name: Some(self.name.clone()),
            properties: Some(TransformationProperties {
                streaming_units: Some(self.streaming_units),
                query: Some(self.query.clone()),
            }),
            ..Default::default()
        }
    }
}

impl DatasourceDeclaration {
    fn expand(&self) -> Datasource {
        Datasource {
            kind: self.kind.clone(),
            properties: self.properties.clone(),
        }
    }
}

impl SerializationDeclaration {
    fn expand(&self) -> Result<Serialization> {
        check_serialization(self)?;
        let serialization = match self {
            SerializationDeclaration::Json { format, .. } => Serialization {
                kind: "Json".into(),
                properties: SerializationProperties {
                    encoding: Some("UTF8".into()),
                    format: format.map(|format| match format {
                        JsonFormat::LineSeparated => "LineSeparated".to_string(),
                        JsonFormat::Array => "Array".to_string(),
                    }),
                    ..Default::default()
                },
            },
            SerializationDeclaration::Csv {
                field_delimiter, ..
            } => Serialization {
                kind: "Csv".into(),
                properties: SerializationProperties {
                    encoding: Some("UTF8".into()),
                    field_delimiter: Some(field_delimiter.clone()),
                    ..Default::default()
                },
            },
            SerializationDeclaration::Avro => Serialization {
                kind: "Avro".into(),
                properties: SerializationProperties::default(),
            },
        };
        Ok(serialization)
    }
}

fn require_non_empty(attribute: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidConfiguration(format!(
            "{} must not be empty",
            attribute
        )));
    }
    Ok(())
}

fn unique_names<'a>(collection: &str, names: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        require_non_empty(&format!("{}.name", collection), name)?;
        if !seen.insert(name) {
            return Err(Error::InvalidConfiguration(format!(
                "{} declares {:?} more than once",
                collection, name
            )));
        }
    }
    Ok(())
}

fn check_serialization(serialization: &SerializationDeclaration) -> Result<()> {
    if let SerializationDeclaration::Csv {
        field_delimiter, ..
    } = serialization
    {
        if !CSV_DELIMITERS.contains(&field_delimiter.as_str()) {
            return Err(Error::InvalidConfiguration(format!(
                "unsupported csv field_delimiter {:?}",
                field_delimiter
            )));
        }
    }
    Ok(())
}

fn check_streaming_units(units: i32) -> Result<()> {
    if units == 1 || units == 3 || (units > 0 && units % 6 == 0) {
        Ok(())
    } else {
        Err(Error::InvalidConfiguration(format!(
            "transformation.streaming_units must be 1, 3 or a multiple of 6, got {}",
            units
        )))
    }
}
