use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("resource id is empty")]
    Empty,
    #[error("resource id {0:?} is not an absolute path")]
    NotAbsolute(String),
    #[error("resource id {0:?} does not consist of key/value pairs")]
    OddSegments(String),
    #[error("resource id {0:?} contains an empty segment")]
    EmptySegment(String),
    #[error("resource id {id:?} has no {key:?} segment")]
    MissingSegment { id: String, key: &'static str },
}

/// An ARM resource identifier broken into its key/value path segments.
///
/// `/subscriptions/{sub}/resourceGroups/{rg}/providers/{namespace}/{type}/{name}` parses into the
/// subscription, the resource group, the provider namespace, and `path`, the remaining
/// `{type}/{name}` pairs in the order they appear.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceId {
    pub subscription_id: String,
    pub resource_group: String,
    pub provider: Option<String>,
    pub path: Vec<(String, String)>,
}

impl ResourceId {
    pub fn segment(&self, key: &str) -> Option<&str> {
        self.path
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn require(&self, key: &'static str) -> Result<&str, ParseError> {
        self.segment(key).ok_or_else(|| ParseError::MissingSegment {
            id: self.to_string(),
            key,
        })
    }
}

impl FromStr for ResourceId {
    type Err = ParseError;

    fn from_str(id: &str) -> Result<Self, Self::Err> {
        if id.is_empty() {
            return Err(ParseError::Empty);
        }
        if !id.starts_with('/') {
            return Err(ParseError::NotAbsolute(id.to_string()));
        }

        let segments: Vec<&str> = id.trim_matches('/').split('/').collect();
        if segments.len() % 2 != 0 {
            return Err(ParseError::OddSegments(id.to_string()));
        }

        let mut path = Vec::with_capacity(segments.len() / 2);
        for pair in segments.chunks(2) {
            let (key, value) = (pair[0], pair[1]);
            if key.is_empty() || value.is_empty() {
                return Err(ParseError::EmptySegment(id.to_string()));
            }
            path.push((key.to_string(), value.to_string()));
        }

        let subscription_id = take(&mut path, "subscriptions")
            .ok_or_else(|| ParseError::MissingSegment {
                id: id.to_string(),
                key: "subscriptions",
            })?;
        // older APIs hand back the lower-cased form
        let resource_group = take(&mut path, "resourceGroups")
            .or_else(|| take(&mut path, "resourcegroups"))
            .ok_or_else(|| ParseError::MissingSegment {
                id: id.to_string(),
                key: "resourceGroups",
            })?;
        let provider = take(&mut path, "providers");

        Ok(Self {
            subscription_id,
            resource_group,
            provider,
            path,
        })
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}",
            self.subscription_id, self.resource_group
        )?;
        if let Some(provider) = &self.provider {
            write!(f, "/providers/{}", provider)?;
        }
        for (key, value) in &self.path {
            write!(f, "/{}/{}", key, value)?;
        }
        Ok(())
    }
}

fn take(path: &mut Vec<(String, String)>, key: &str) -> Option<String> {
    let index = path.iter().position(|(k, _)| k == key)?;
    Some(path.remove(index).1)
}

/// Builds the identifier ARM assigns to a streaming job.
pub fn streaming_job_id(subscription_id: &str, resource_group: &str, job_name: &str) -> String {
    format!(
        "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.StreamAnalytics/streamingjobs/{}",
        subscription_id, resource_group, job_name
    )
}
