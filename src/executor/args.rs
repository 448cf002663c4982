//! Call arguments and parameter binding
//!
//! Every lane is invoked with the same arguments plus its own lane id,
//! which is bound to the reserved name `lane` before any parameter.

use std::collections::{BTreeMap, HashMap};

use super::errors::BindError;
use super::expressions::{eval_expr, Env};
use super::types::{Param, Val};
use crate::parser::semantic_validator::rules::LANE_ID;

/// Arguments forwarded to every lane
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    pub positional: Vec<Val>,
    pub keyword: BTreeMap<String, Val>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arguments with only positional values
    pub fn positional(values: Vec<Val>) -> Self {
        Self {
            positional: values,
            keyword: BTreeMap::new(),
        }
    }

    /// Add a keyword argument
    pub fn with_keyword(mut self, name: impl Into<String>, value: impl Into<Val>) -> Self {
        self.keyword.insert(name.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }
}

/// Build the initial environment of one lane
///
/// Binding order: positional, then keyword, then defaults. Defaults are
/// evaluated in declaration order with `lane` and every earlier parameter
/// already in scope.
pub fn bind_arguments(params: &[Param], lane_id: usize, args: &Args) -> Result<Env, BindError> {
    if args.positional.len() > params.len() {
        return Err(BindError::TooManyPositional {
            expected: params.len(),
            got: args.positional.len(),
        });
    }

    let mut bound: HashMap<&str, Val> = HashMap::new();
    for (param, value) in params.iter().zip(&args.positional) {
        bound.insert(param.name.as_str(), value.clone());
    }

    for (name, value) in &args.keyword {
        if !params.iter().any(|p| &p.name == name) {
            return Err(BindError::UnknownKeyword { name: name.clone() });
        }
        if bound.insert(name.as_str(), value.clone()).is_some() {
            return Err(BindError::MultipleValues { name: name.clone() });
        }
    }

    let mut env = Env::new();
    env.insert(LANE_ID.to_string(), Val::Num(lane_id as f64));

    for param in params {
        let value = match bound.remove(param.name.as_str()) {
            Some(value) => value,
            None => match &param.default {
                Some(default) => {
                    eval_expr(default, &env, lane_id).map_err(|source| BindError::Default {
                        name: param.name.clone(),
                        source,
                    })?
                }
                None => {
                    return Err(BindError::Missing {
                        name: param.name.clone(),
                    })
                }
            },
        };
        env.insert(param.name.clone(), value);
    }

    Ok(env)
}
