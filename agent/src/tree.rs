//! Recursive fetching of Proxmox VE API trees
//!
//! The API is a tree of `api2/json/<path>` elements. A [`Request`] describes
//! which parts of that tree are wanted, [`get_tree`] walks the API along it
//! and assembles one JSON document.
//!
//! A request shape is written as JSON:
//!
//! ```text
//! {"cluster": {"resources": []},
//!  "nodes": [{"{node}": {"version": {}, "qemu": [{"{vmid}": {"snapshot": []}}]}}]}
//! ```
//!
//! Map keys are path segments. An empty list or map is a leaf. A list with a
//! single `{"{var}": shape}` element descends into every object returned at
//! that level, using the object's `var` attribute as the next path segment.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{AgentError, Result};

/// Something that answers `GET api2/json/<path>` with the decoded `data`
#[async_trait]
pub trait ApiSource: Send + Sync {
    async fn get_api_element(&self, path: &str) -> Result<Value>;
}

/// Requested shape of an API subtree
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Map(BTreeMap<String, Request>),
    List(Option<Box<Request>>),
}

impl Request {
    pub fn leaf() -> Self {
        Request::List(None)
    }

    /// Build a request from its JSON notation
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Object(map) => map
                .iter()
                .map(|(key, value)| Ok((key.clone(), Request::from_value(value)?)))
                .collect::<Result<BTreeMap<_, _>>>()
                .map(Request::Map),
            Value::Array(items) => match items.as_slice() {
                [] => Ok(Request::List(None)),
                [inner] => Ok(Request::List(Some(Box::new(Request::from_value(inner)?)))),
                _ => Err(AgentError::unexpected_shape(
                    "",
                    "a request list holds at most one element",
                )),
            },
            other => Err(AgentError::unexpected_shape(
                "",
                format!("invalid request element {}", other),
            )),
        }
    }

    fn subtree(&self) -> Option<&BTreeMap<String, Request>> {
        match self {
            Request::Map(map) => Some(map),
            Request::List(Some(inner)) => match inner.as_ref() {
                Request::Map(map) => Some(map),
                Request::List(_) => None,
            },
            Request::List(None) => None,
        }
    }
}

/// A `{name}` binding found in a request subtree
struct Variable<'a> {
    name: &'a str,
    subtree: &'a Request,
}

fn find_variable<'a>(
    path: &str,
    subtree: Option<&'a BTreeMap<String, Request>>,
) -> Result<Option<Variable<'a>>> {
    let Some(subtree) = subtree else {
        return Ok(None);
    };
    let mut variables = subtree.iter().filter(|(key, _)| key.starts_with('{'));
    match variables.next() {
        None => Ok(None),
        Some(_) if subtree.len() != 1 => Err(AgentError::unexpected_shape(
            path,
            "a variable must be the only key of its level",
        )),
        Some((key, request)) => Ok(Some(Variable {
            name: key.trim_matches(&['{', '}'][..]),
            subtree: request,
        })),
    }
}

/// Name of a subtree stub like `{"name": "log"}`, `{"subdir": "qemu"}`
fn stub_name(elem: &Value) -> Option<String> {
    let object = elem.as_object()?;
    if object.len() != 1 {
        return None;
    }
    ["name", "subdir", "cmd"]
        .iter()
        .find_map(|key| object.get(*key))
        .map(path_segment)
}

fn path_segment(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn join(path: &[String]) -> String {
    path.join("/")
}

/// Fetch everything `request` asks for, starting at the API root
pub async fn get_tree(source: &dyn ApiSource, request: &Request) -> Result<Value> {
    rec_get_tree(source, None, request, Vec::new()).await
}

fn rec_get_tree<'a>(
    source: &'a dyn ApiSource,
    element: Option<String>,
    request: &'a Request,
    mut path: Vec<String>,
) -> BoxFuture<'a, Result<Value>> {
    async move {
        path.extend(element);
        let current = join(&path);
        let subtree = request.subtree();
        let variable = find_variable(&current, subtree)?;

        debug!("Fetching API element {:?}", current);
        let response = source.get_api_element(&current).await?;
        let Value::Array(items) = &response else {
            return Ok(response);
        };

        let stubs: Option<Vec<String>> = if items.is_empty() {
            None
        } else {
            items.iter().map(stub_name).collect()
        };

        if let Some(names) = stubs {
            let subtree = match (request, subtree, &variable) {
                (Request::Map(_), Some(subtree), None) if !subtree.is_empty() => subtree,
                _ => {
                    return Err(AgentError::unexpected_shape(
                        &current,
                        "subtree names returned for a request without named children",
                    ))
                }
            };
            let mut result = Map::new();
            for name in names {
                if let Some(child) = subtree.get(&name) {
                    let value =
                        rec_get_tree(source, Some(name.clone()), child, path.clone()).await?;
                    result.insert(name, value);
                }
            }
            return Ok(Value::Object(result));
        }

        if !items.iter().all(Value::is_object) {
            return Ok(response);
        }

        let Some(variable) = variable else {
            return match request {
                Request::Map(children) => {
                    let mut result = Map::new();
                    for (key, child) in children {
                        let value =
                            rec_get_tree(source, Some(key.clone()), child, path.clone()).await?;
                        result.insert(key.clone(), value);
                    }
                    Ok(Value::Object(result))
                }
                Request::List(_) => Ok(response),
            };
        };

        if let Request::Map(_) = request {
            return Err(AgentError::unexpected_shape(
                &current,
                "a variable has to be requested inside a list",
            ));
        }

        let mut merged = Vec::with_capacity(items.len());
        for elem in items {
            let mut object = elem.as_object().cloned().unwrap_or_default();
            let segment = object.get(variable.name).map(path_segment).ok_or_else(|| {
                AgentError::unexpected_shape(
                    &current,
                    format!("element without attribute {:?}", variable.name),
                )
            })?;
            match rec_get_tree(source, Some(segment), variable.subtree, path.clone()).await? {
                Value::Object(deeper) => object.extend(deeper),
                Value::Null => {}
                Value::Array(list) if list.is_empty() => {}
                other => {
                    return Err(AgentError::unexpected_shape(
                        &current,
                        format!("cannot merge {} into an element", other),
                    ))
                }
            }
            merged.push(Value::Object(object));
        }
        Ok(Value::Array(merged))
    }
    .boxed()
}
