//! A lookup engine answering from a fixed table, for value kinds and failure
//! modes the fixture writer does not produce.

use pf_error::{LookupError, OpenError};
use pf_traits::{LookupClient, LookupEngine};
use pf_types::{CachePolicy, DatabaseMetadata, LookupValue};
use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;

#[derive(Debug, Clone)]
pub enum Answer {
    Value(LookupValue),
    Fail(String),
}

#[derive(Debug, Clone, Default)]
pub struct StaticEngine {
    answers: HashMap<IpAddr, Answer>,
}

impl StaticEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, addr: &str, value: LookupValue) -> Self {
        self.answers.insert(addr.parse().unwrap(), Answer::Value(value));
        self
    }

    pub fn with_failure(mut self, addr: &str, message: &str) -> Self {
        self.answers
            .insert(addr.parse().unwrap(), Answer::Fail(message.to_string()));
        self
    }
}

pub struct StaticClient {
    answers: HashMap<IpAddr, Answer>,
    metadata: DatabaseMetadata,
}

impl LookupClient for StaticClient {
    fn query(&self, addr: IpAddr) -> Result<Option<LookupValue>, LookupError> {
        match self.answers.get(&addr) {
            Some(Answer::Value(value)) => Ok(Some(value.clone())),
            Some(Answer::Fail(message)) => Err(LookupError::Io(message.clone())),
            None => Ok(None),
        }
    }

    fn metadata(&self) -> &DatabaseMetadata {
        &self.metadata
    }
}

impl LookupEngine for StaticEngine {
    type Client = StaticClient;

    fn open(&self, path: &Path, _cache: CachePolicy) -> Result<StaticClient, OpenError> {
        if !path.exists() {
            return Err(OpenError::NotFound(path.to_path_buf()));
        }
        Ok(StaticClient {
            answers: self.answers.clone(),
            metadata: DatabaseMetadata {
                ip_version: 6,
                database_type: "static".to_string(),
                build_epoch: 0,
                node_count: 0,
                record_size: 24,
                binary_format_major_version: 2,
                binary_format_minor_version: 0,
                languages: Vec::new(),
                description: Default::default(),
            },
        })
    }

    fn name(&self) -> &str {
        "static"
    }
}
