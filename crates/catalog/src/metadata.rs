// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Metadata object model
//!
//! Every node of the cluster → database → folder → table/function → column
//! hierarchy is a [`MetadataObject`]. The kind-specific fields live in
//! [`ObjectDetails`], so the resolver matches on a closed enum instead of
//! downcasting.
//!
//! Objects are immutable once built. The urn is computed from the parent's urn
//! at construction time and is only used for display and identity, never as a
//! cache key.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Discriminant of a [`MetadataObject`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetadataType {
    Cluster,
    Database,
    Table,
    Column,
    Folder,
    Function,
}

impl fmt::Display for MetadataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetadataType::Cluster => "Cluster",
            MetadataType::Database => "Database",
            MetadataType::Table => "Table",
            MetadataType::Column => "Column",
            MetadataType::Folder => "Folder",
            MetadataType::Function => "Function",
        };
        f.write_str(name)
    }
}

/// Non-owning reference from a synthetic folder to the object it lives under
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParentRef {
    pub metadata_type: MetadataType,
    pub name: String,
    pub urn: String,
    pub cluster_name: String,
    pub database_name: String,
}

/// Function text as returned by `.show functions`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub parameters: String,
    pub body: String,
    pub doc_string: String,
}

impl FunctionDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder method: set the parameter list, e.g. `(start:datetime)`
    pub fn with_parameters(mut self, parameters: impl Into<String>) -> Self {
        self.parameters = parameters.into();
        self
    }

    /// Builder method: set the function body
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Builder method: set the doc string
    pub fn with_doc_string(mut self, doc_string: impl Into<String>) -> Self {
        self.doc_string = doc_string.into();
        self
    }
}

/// Kind-specific payload of a [`MetadataObject`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectDetails {
    Cluster,
    Database {
        cluster_name: String,
    },
    Table {
        cluster_name: String,
        database_name: String,
        /// Folder label; `None` when the table sits at the database root
        folder: Option<String>,
    },
    Column {
        database_name: String,
        table_name: String,
        data_type: String,
    },
    Folder {
        parent: ParentRef,
    },
    Function {
        cluster_name: String,
        database_name: String,
        folder: Option<String>,
        parameters: String,
        body: String,
        doc_string: String,
    },
}

/// A node in the metadata hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetadataObject {
    name: String,
    pretty_name: String,
    urn: String,
    details: ObjectDetails,
}

impl MetadataObject {
    /// Create the root cluster object. `uri` should already be canonical.
    pub fn cluster(uri: impl Into<String>) -> Self {
        let uri = uri.into();
        Self {
            pretty_name: uri.clone(),
            urn: uri.clone(),
            name: uri,
            details: ObjectDetails::Cluster,
        }
    }

    /// Create a database living in `cluster`.
    ///
    /// An empty `pretty_name` falls back to `name`.
    pub fn database(
        cluster: &MetadataObject,
        name: impl Into<String>,
        pretty_name: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let pretty_name = non_empty_or(pretty_name.into(), &name);
        Self {
            urn: child_urn(cluster, &name),
            details: ObjectDetails::Database {
                cluster_name: cluster.name.clone(),
            },
            name,
            pretty_name,
        }
    }

    /// Create a synthetic folder grouping node under `parent`
    pub fn folder(parent: &MetadataObject, label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            pretty_name: label.clone(),
            urn: child_urn(parent, &label),
            details: ObjectDetails::Folder {
                parent: ParentRef {
                    metadata_type: parent.metadata_type(),
                    name: parent.name.clone(),
                    urn: parent.urn.clone(),
                    cluster_name: parent.cluster_name().unwrap_or_default().to_string(),
                    database_name: parent.database_name().unwrap_or_default().to_string(),
                },
            },
            name: label,
        }
    }

    /// Create a table under a database or a folder.
    ///
    /// When `parent` is a folder the table inherits its label.
    pub fn table(parent: &MetadataObject, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            pretty_name: name.clone(),
            urn: child_urn(parent, &name),
            details: ObjectDetails::Table {
                cluster_name: parent.cluster_name().unwrap_or_default().to_string(),
                database_name: parent.database_name().unwrap_or_default().to_string(),
                folder: parent.folder_label(),
            },
            name,
        }
    }

    /// Create a function under a database or a folder
    pub fn function(parent: &MetadataObject, definition: FunctionDefinition) -> Self {
        let FunctionDefinition {
            name,
            parameters,
            body,
            doc_string,
        } = definition;
        Self {
            pretty_name: name.clone(),
            urn: child_urn(parent, &name),
            details: ObjectDetails::Function {
                cluster_name: parent.cluster_name().unwrap_or_default().to_string(),
                database_name: parent.database_name().unwrap_or_default().to_string(),
                folder: parent.folder_label(),
                parameters,
                body,
                doc_string,
            },
            name,
        }
    }

    /// Create a column of `table`
    pub fn column(
        table: &MetadataObject,
        name: impl Into<String>,
        data_type: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            pretty_name: name.clone(),
            urn: child_urn(table, &name),
            details: ObjectDetails::Column {
                database_name: table.database_name().unwrap_or_default().to_string(),
                table_name: table.name.clone(),
                data_type: data_type.into(),
            },
            name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pretty_name(&self) -> &str {
        &self.pretty_name
    }

    pub fn urn(&self) -> &str {
        &self.urn
    }

    pub fn details(&self) -> &ObjectDetails {
        &self.details
    }

    pub fn metadata_type(&self) -> MetadataType {
        match self.details {
            ObjectDetails::Cluster => MetadataType::Cluster,
            ObjectDetails::Database { .. } => MetadataType::Database,
            ObjectDetails::Table { .. } => MetadataType::Table,
            ObjectDetails::Column { .. } => MetadataType::Column,
            ObjectDetails::Folder { .. } => MetadataType::Folder,
            ObjectDetails::Function { .. } => MetadataType::Function,
        }
    }

    /// Owning cluster, if the object records one
    pub fn cluster_name(&self) -> Option<&str> {
        match &self.details {
            ObjectDetails::Cluster => Some(&self.name),
            ObjectDetails::Database { cluster_name }
            | ObjectDetails::Table { cluster_name, .. }
            | ObjectDetails::Function { cluster_name, .. } => Some(cluster_name),
            ObjectDetails::Folder { parent } => Some(&parent.cluster_name),
            ObjectDetails::Column { .. } => None,
        }
    }

    /// Owning database; a database returns its own name
    pub fn database_name(&self) -> Option<&str> {
        match &self.details {
            ObjectDetails::Cluster => None,
            ObjectDetails::Database { .. } => Some(&self.name),
            ObjectDetails::Table { database_name, .. }
            | ObjectDetails::Column { database_name, .. }
            | ObjectDetails::Function { database_name, .. } => Some(database_name),
            ObjectDetails::Folder { parent } => Some(&parent.database_name),
        }
    }

    /// Folder label of a table or function
    pub fn folder_name(&self) -> Option<&str> {
        match &self.details {
            ObjectDetails::Table { folder, .. } | ObjectDetails::Function { folder, .. } => {
                folder.as_deref()
            }
            _ => None,
        }
    }

    /// Remote type name of a column
    pub fn data_type(&self) -> Option<&str> {
        match &self.details {
            ObjectDetails::Column { data_type, .. } => Some(data_type),
            _ => None,
        }
    }

    /// Owning table of a column
    pub fn table_name(&self) -> Option<&str> {
        match &self.details {
            ObjectDetails::Column { table_name, .. } => Some(table_name),
            _ => None,
        }
    }

    /// Columns and functions never have children
    pub fn is_leaf(&self) -> bool {
        matches!(
            self.metadata_type(),
            MetadataType::Column | MetadataType::Function
        )
    }

    // The label children inherit when created under this object
    fn folder_label(&self) -> Option<String> {
        match &self.details {
            ObjectDetails::Folder { .. } => Some(self.name.clone()),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.metadata_type(), self.urn)
    }
}

fn child_urn(parent: &MetadataObject, name: &str) -> String {
    format!("{}.{}", parent.urn, name)
}

fn non_empty_or(value: String, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value
    }
}
