//! Field projection: which lookup result fields are copied into a record.
//!
//! A projection is built from specs of the form `before[:after]`:
//!
//! - `before` is a dotted path into the lookup result (`country.names.en`)
//! - `after` is the output key, defaulting to the last segment of `before`
//!
//! Every output is written as a flat key under the filter's target field,
//! whatever the depth of `before`.

use pf_error::ConfigError;
use pf_types::LookupValue;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static FIELD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<before>\w+(?:\.\w+)*)(?:\s*:\s*(?P<after>\w+))?$")
        .expect("valid field pattern")
});

/// One segment of a projection path.
///
/// A node with a target emits its value under that name; a node with
/// children descends into its value when that value is a map. A node always
/// has at least one of the two.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldNode {
    name: String,
    target: Option<String>,
    children: BTreeMap<String, FieldNode>,
}

/// Shape of a [`FieldNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Emits its value, no children.
    Leaf,
    /// Only descends into its children.
    Branch,
    /// Emits its value and descends into its children.
    LeafAndBranch,
}

impl FieldNode {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            target: None,
            children: BTreeMap::new(),
        }
    }

    /// Key looked up in the result map.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Output key, if this node emits.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Nested nodes.
    pub fn children(&self) -> &BTreeMap<String, FieldNode> {
        &self.children
    }

    pub fn kind(&self) -> NodeKind {
        match (self.target.is_some(), self.children.is_empty()) {
            (true, true) => NodeKind::Leaf,
            (true, false) => NodeKind::LeafAndBranch,
            (false, _) => NodeKind::Branch,
        }
    }
}

/// Which fields of a lookup result are copied, and under what keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionSpec {
    /// Copy every top-level entry of the result.
    ExportAll,
    /// Copy only the listed paths. An empty map copies nothing.
    Fields(BTreeMap<String, FieldNode>),
}

impl Default for ProjectionSpec {
    fn default() -> Self {
        Self::ExportAll
    }
}

impl ProjectionSpec {
    /// Projection that copies every top-level entry.
    pub fn export_all() -> Self {
        Self::ExportAll
    }

    /// Build a projection tree from `before[:after]` specs.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidFields`] if any spec does not match the grammar.
    /// The error describes the whole list, not the offending element.
    pub fn build<S: AsRef<str>>(specs: &[S]) -> Result<Self, ConfigError> {
        let mut roots = BTreeMap::new();

        for spec in specs {
            let captures = FIELD_PATTERN
                .captures(spec.as_ref())
                .ok_or(ConfigError::InvalidFields)?;
            let before = &captures["before"];
            let path: Vec<&str> = before.split('.').collect();
            let after = match captures.name("after") {
                Some(after) => after.as_str(),
                None => path.last().copied().unwrap_or(before),
            };
            insert(&mut roots, &path, after);
        }

        Ok(Self::Fields(roots))
    }

    /// Build from optional specs: `None` exports everything.
    pub fn from_specs<S: AsRef<str>>(specs: Option<&[S]>) -> Result<Self, ConfigError> {
        specs.map_or(Ok(Self::ExportAll), Self::build)
    }

    /// Returns true for [`ProjectionSpec::ExportAll`].
    pub fn is_export_all(&self) -> bool {
        matches!(self, Self::ExportAll)
    }

    /// Project `result`, calling `emit(output_key, value)` for every output.
    ///
    /// A non-map result emits nothing. Emission order is deterministic for a
    /// given projection.
    pub fn project<F>(&self, result: &LookupValue, mut emit: F)
    where
        F: FnMut(&str, &LookupValue),
    {
        let Some(map) = result.as_map() else {
            return;
        };

        match self {
            Self::ExportAll => {
                for (key, value) in map {
                    emit(key, value);
                }
            }
            Self::Fields(nodes) => project_nodes(nodes, map, &mut emit),
        }
    }
}

fn insert(nodes: &mut BTreeMap<String, FieldNode>, path: &[&str], target: &str) {
    let Some((segment, rest)) = path.split_first() else {
        return;
    };
    let node = nodes
        .entry(segment.to_string())
        .or_insert_with(|| FieldNode::new(segment));

    if rest.is_empty() {
        // Duplicate leaf path: last spec wins
        node.target = Some(target.to_string());
    } else {
        insert(&mut node.children, rest, target);
    }
}

fn project_nodes<F>(
    nodes: &BTreeMap<String, FieldNode>,
    map: &BTreeMap<String, LookupValue>,
    emit: &mut F,
) where
    F: FnMut(&str, &LookupValue),
{
    for node in nodes.values() {
        let Some(value) = map.get(&node.name) else {
            continue;
        };
        if let Some(target) = &node.target {
            emit(target, value);
        }
        if !node.children.is_empty() {
            if let Some(nested) = value.as_map() {
                project_nodes(&node.children, nested, emit);
            }
        }
    }
}
